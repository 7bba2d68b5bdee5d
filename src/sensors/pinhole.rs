// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::ray::Ray3f;

// Pinhole camera. The image plane sits at unit distance along the view
// direction; `yview` is the plane's full height there, so the vertical
// field of view is 2*atan(yview/2). Rays are generated as
// left_upper + (x + jitter)*dx + (y + jitter)*dy, with dy pointing down
// the image.
#[derive(Debug, Clone, PartialEq)]
pub struct PinholeCamera {
    origin: Vector3f,
    left_upper: Vector3f,
    dx: Vector3f,
    dy: Vector3f,
    width: usize,
    height: usize,
}

impl PinholeCamera {
    pub fn new(eye: Vector3f,
               look_at: Vector3f,
               up: Vector3f,
               yview: Float,
               width: usize,
               height: usize) -> Self {
        let forward = (look_at - eye).normalize();
        let right = forward.cross(&up).normalize();
        let up = right.cross(&forward).normalize();

        let half_h = 0.5 * yview;
        let half_w = half_h * (width as Float) / (height as Float);

        let left_upper = forward - right * half_w + up * half_h;
        let dx = right * (2.0 * half_w / width as Float);
        let dy = up * (-2.0 * half_h / height as Float);

        Self { origin: eye, left_upper, dx, dy, width, height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn origin(&self) -> Vector3f {
        self.origin
    }

    pub fn sample_ray(&self, x: usize, y: usize, jitter: &Vector2f) -> Ray3f {
        let dir = self.left_upper
            + self.dx * (x as Float + jitter.x)
            + self.dy * (y as Float + jitter.y);
        Ray3f::new(self.origin, dir, Some(0.0), None)
    }
}
