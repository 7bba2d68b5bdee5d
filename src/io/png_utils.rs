// Copyright @yucwang 2026

use crate::math::bitmap::Bitmap;
use crate::math::constants::Float;

// Display transform for quantized output: exposure scale, a soft knee
// that rolls highlights off towards `knee_high` (the white point), then
// gamma compression. EXR output bypasses all of this and stores the raw
// linear frame.
#[derive(Debug, Clone, Copy)]
pub struct ToneMap {
    pub exposure: Float,
    pub knee_low: Float,
    pub knee_high: Float,
    pub gamma: Float,
}

impl Default for ToneMap {
    fn default() -> Self {
        Self { exposure: 0.0, knee_low: 0.0, knee_high: 5.0, gamma: 2.2 }
    }
}

impl ToneMap {
    // Normalization mode: map the brightest observed channel to white,
    // no knee, keep the gamma.
    pub fn normalized_to(max_value: Float, gamma: Float) -> Self {
        Self {
            exposure: 0.0,
            knee_low: max_value.max(1e-6),
            knee_high: max_value.max(1e-6),
            gamma,
        }
    }

    pub fn apply(&self, value: Float) -> Float {
        let mut v = value.max(0.0) * self.exposure.exp2();

        let width = self.knee_high - self.knee_low;
        if width > 0.0 && v > self.knee_low {
            // rational soft knee, asymptotic to knee_high
            let over = v - self.knee_low;
            v = self.knee_low + over / (1.0 + over / width);
        }
        v /= self.knee_high.max(1e-6);

        v.powf(1.0 / self.gamma).min(1.0)
    }
}

pub fn to_rgb8(frame: &Bitmap, tone: &ToneMap) -> Vec<u8> {
    let mut data = Vec::with_capacity(frame.width() * frame.height() * 3);
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            let pixel = frame[(x, y)];
            for idx in 0..3 {
                data.push((255.0 * tone.apply(pixel[idx])) as u8);
            }
        }
    }

    data
}

pub fn write_to_file(frame: &Bitmap, tone: &ToneMap, file_path: &str) -> Result<(), String> {
    log::info!("Starting writing image: {}.", file_path);

    let data = to_rgb8(frame, tone);
    let image = image::RgbImage::from_raw(frame.width() as u32,
                                          frame.height() as u32,
                                          data)
        .ok_or_else(|| String::from("frame buffer has the wrong size"))?;
    image
        .save(file_path)
        .map_err(|e| format!("failed to write {}: {}", file_path, e))?;

    log::info!("Image written to: {}.", file_path);
    Ok(())
}
