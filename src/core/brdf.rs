// Copyright @yucwang 2026

use crate::math::constants::{ INV_PI, Float, Vector2f, Vector3f };
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{ sample_cosine_hemisphere, sample_cosine_hemisphere_pdf };

// Surface scattering model, returned by value at every hit. Emissive
// surfaces reflect diffusely as well, so both variants share the
// Lambertian lobe and only emission differs.
#[derive(Debug, Clone, Copy)]
pub enum Brdf {
    Diffuse { albedo: RGBSpectrum },
    Emissive { albedo: RGBSpectrum, radiance: RGBSpectrum },
}

impl Brdf {
    pub fn albedo(&self) -> RGBSpectrum {
        match self {
            Brdf::Diffuse { albedo } => *albedo,
            Brdf::Emissive { albedo, .. } => *albedo,
        }
    }

    pub fn f(&self, _wi: &Vector3f, _wo: &Vector3f, _n: &Vector3f) -> RGBSpectrum {
        self.albedo() * INV_PI
    }

    // Cosine-weighted hemisphere sample about the shading normal.
    // Returns the world-space incoming direction and its pdf cos(theta)/pi.
    pub fn sample_wi(&self, n: &Vector3f, u: &Vector2f) -> (Vector3f, Float) {
        let (tangent, bitangent) = build_tangent_frame(n);
        let local = sample_cosine_hemisphere(u);
        let wi = (tangent * local.x + bitangent * local.y + n * local.z).normalize();
        let pdf = sample_cosine_hemisphere_pdf(n.dot(&wi).max(0.0));

        (wi, pdf)
    }

    pub fn radiance(&self) -> RGBSpectrum {
        match self {
            Brdf::Diffuse { .. } => RGBSpectrum::default(),
            Brdf::Emissive { radiance, .. } => *radiance,
        }
    }
}

// Orthonormal basis around the normal. The near-axis case picks a
// different up vector so the cross products stay well conditioned.
pub fn build_tangent_frame(n: &Vector3f) -> (Vector3f, Vector3f) {
    let up = if n.z.abs() < 0.999 {
        Vector3f::new(0.0, 0.0, 1.0)
    } else {
        Vector3f::new(1.0, 0.0, 0.0)
    };
    let tangent = n.cross(&up).normalize();
    let bitangent = n.cross(&tangent).normalize();
    (tangent, bitangent)
}
