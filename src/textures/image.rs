// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f};
use crate::math::spectrum::RGBSpectrum;

use image::io::Reader as ImageReader;
use image::GenericImageView;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Bilinear,
    Nearest,
}

// Diffuse map: linear RGB rows, repeat-wrapped lookups. Loaded once by
// the model loader and shared by every material that binds it.
pub struct ImageTexture {
    width: usize,
    height: usize,
    data: Vec<Float>,
    filter_mode: FilterMode,
}

fn srgb_to_linear(v: Float) -> Float {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

impl ImageTexture {
    pub fn from_file(path: &str) -> Result<Self, String> {
        let img = ImageReader::open(path)
            .map_err(|e| format!("failed to open image {}: {}", path, e))?
            .decode()
            .map_err(|e| format!("failed to decode image {}: {}", path, e))?;

        let (width, height) = img.dimensions();
        let width = width as usize;
        let height = height as usize;
        let rgb = img.to_rgb32f();

        let mut data = vec![0.0; width * height * 3];
        for y in 0..height {
            for x in 0..width {
                let p = rgb.get_pixel(x as u32, y as u32);
                let base = (y * width + x) * 3;
                data[base] = srgb_to_linear(p[0]);
                data[base + 1] = srgb_to_linear(p[1]);
                data[base + 2] = srgb_to_linear(p[2]);
            }
        }

        log::info!("Loaded texture {} ({}x{}).", path, width, height);
        Ok(Self::from_pixels(width, height, data))
    }

    pub fn from_pixels(width: usize, height: usize, data: Vec<Float>) -> Self {
        assert_eq!(data.len(), width * height * 3);
        Self { width, height, data, filter_mode: FilterMode::Bilinear }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn set_filter_mode(&mut self, filter_mode: FilterMode) {
        self.filter_mode = filter_mode;
    }

    pub fn eval(&self, uv: Vector2f) -> RGBSpectrum {
        if self.width == 0 || self.height == 0 {
            return RGBSpectrum::default();
        }
        match self.filter_mode {
            FilterMode::Bilinear => self.sample_bilinear(uv),
            FilterMode::Nearest => self.sample_nearest(uv),
        }
    }

    fn pixel_at(&self, x: usize, y: usize) -> (Float, Float, Float) {
        let base = (y * self.width + x) * 3;
        (self.data[base], self.data[base + 1], self.data[base + 2])
    }

    fn wrap_index(&self, idx: isize, size: usize) -> usize {
        idx.rem_euclid(size as isize) as usize
    }

    fn sample_nearest(&self, uv: Vector2f) -> RGBSpectrum {
        let u = uv.x.rem_euclid(1.0);
        let v = uv.y.rem_euclid(1.0);

        let x = (u * self.width as Float) as isize;
        let y = ((1.0 - v) * self.height as Float) as isize;
        let xi = self.wrap_index(x, self.width);
        let yi = self.wrap_index(y, self.height);
        let (r, g, b) = self.pixel_at(xi, yi);
        RGBSpectrum::new(r, g, b)
    }

    fn sample_bilinear(&self, uv: Vector2f) -> RGBSpectrum {
        let u = uv.x.rem_euclid(1.0);
        let v = uv.y.rem_euclid(1.0);

        let x = u * self.width as Float - 0.5;
        let y = (1.0 - v) * self.height as Float - 0.5;

        let x0 = x.floor() as isize;
        let y0 = y.floor() as isize;
        let tx = x - x0 as Float;
        let ty = y - y0 as Float;

        let x0u = self.wrap_index(x0, self.width);
        let x1u = self.wrap_index(x0 + 1, self.width);
        let y0u = self.wrap_index(y0, self.height);
        let y1u = self.wrap_index(y0 + 1, self.height);

        let (r00, g00, b00) = self.pixel_at(x0u, y0u);
        let (r10, g10, b10) = self.pixel_at(x1u, y0u);
        let (r01, g01, b01) = self.pixel_at(x0u, y1u);
        let (r11, g11, b11) = self.pixel_at(x1u, y1u);

        let r0 = r00 * (1.0 - tx) + r10 * tx;
        let g0 = g00 * (1.0 - tx) + g10 * tx;
        let b0 = b00 * (1.0 - tx) + b10 * tx;

        let r1 = r01 * (1.0 - tx) + r11 * tx;
        let g1 = g01 * (1.0 - tx) + g11 * tx;
        let b1 = b01 * (1.0 - tx) + b11 * tx;

        RGBSpectrum::new(r0 * (1.0 - ty) + r1 * ty,
                         g0 * (1.0 - ty) + g1 * ty,
                         b0 * (1.0 - ty) + b1 * ty)
    }
}
