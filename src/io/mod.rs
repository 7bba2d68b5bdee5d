// Copyright @yucwang 2021

pub mod exr_utils;
pub mod obj_utils;
pub mod png_utils;
pub mod rtc_utils;
