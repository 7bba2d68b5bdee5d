// Copyright @yucwang 2026

use crate::core::brdf::Brdf;
use crate::core::geometry::{ BrdfKind, GeometryStore, PointLight, SurfaceLight };
use crate::core::kdtree::{ KdTree, RayHit };
use crate::core::rng::LcgRng;
use crate::math::constants::{ Float, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::square_to_triangle;

// A sampled point on a surface light, with the pdf already folded over
// light selection and light area: pdf = 1 / (num_lights * area).
pub struct LightSample {
    pub triangle: u32,
    pub point: Vector3f,
    pub normal: Vector3f,
    pub radiance: RGBSpectrum,
    pub pdf: Float,
}

// Shading data resolved at a hit point.
pub struct Shading {
    pub point: Vector3f,
    pub normal: Vector3f,
    pub brdf: Brdf,
}

// The frozen render-time snapshot: geometry, its spatial index, the light
// lists and the background. Nothing here mutates once built, which is
// what lets render workers share it without locks.
pub struct Scene {
    geometry: GeometryStore,
    kdtree: KdTree,
    surface_lights: Vec<SurfaceLight>,
    point_lights: Vec<PointLight>,
    background: RGBSpectrum,
}

impl Scene {
    pub fn build(geometry: GeometryStore,
                 point_lights: Vec<PointLight>,
                 background: RGBSpectrum,
                 leaf_size: usize) -> Self {
        let kdtree = KdTree::build(&geometry.triangles, leaf_size);
        let surface_lights = geometry.surface_lights();
        log::info!("Scene has {} surface lights and {} point lights.",
                   surface_lights.len(), point_lights.len());

        Self { geometry, kdtree, surface_lights, point_lights, background }
    }

    pub fn geometry(&self) -> &GeometryStore {
        &self.geometry
    }

    pub fn background(&self) -> RGBSpectrum {
        self.background
    }

    pub fn surface_lights(&self) -> &[SurfaceLight] {
        &self.surface_lights
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn nearest_hit(&self, ray: &Ray3f) -> Option<RayHit> {
        self.kdtree.nearest_hit(&self.geometry.triangles, ray)
    }

    // Whether anything blocks the segment from `origin` towards `dir`
    // strictly before `distance`. The sampled light triangle is excluded
    // so it cannot occlude itself.
    pub fn occluded(&self,
                    origin: &Vector3f,
                    dir: &Vector3f,
                    distance: Float,
                    exclude: Option<u32>) -> bool {
        let ray = Ray3f::new(*origin, *dir, Some(0.0), Some(distance));
        self.kdtree.hit_before(&self.geometry.triangles, &ray, exclude)
    }

    pub fn shading_at(&self, hit: &RayHit) -> Shading {
        let triangle = &self.geometry.triangles[hit.triangle as usize];
        let material = &self.geometry.materials[hit.triangle as usize];

        let point = triangle.point_at(hit.u, hit.v);
        let albedo = material.albedo_at(hit.u, hit.v);
        let brdf = match material.kind {
            BrdfKind::Diffuse => Brdf::Diffuse { albedo },
            BrdfKind::Emissive => Brdf::Emissive { albedo, radiance: material.ke },
        };

        Shading { point, normal: material.normal, brdf }
    }

    // Uniformly pick one surface light, then a uniform point on it.
    // Returns None when the scene has no emissive triangles at all, in
    // which case next-event estimation is skipped.
    pub fn sample_surface_light(&self, rng: &mut LcgRng) -> Option<LightSample> {
        if self.surface_lights.is_empty() {
            return None;
        }

        let count = self.surface_lights.len();
        let mut index = (rng.next_f32() * count as Float) as usize;
        if index >= count {
            index = count - 1;
        }
        let light = &self.surface_lights[index];

        let triangle = &self.geometry.triangles[light.triangle as usize];
        let material = &self.geometry.materials[light.triangle as usize];

        let bary = square_to_triangle(&rng.next_2d());
        let point = triangle.p0 * bary.x + triangle.p1 * bary.y + triangle.p2 * bary.z;
        let pdf = 1.0 / (count as Float * light.area);

        Some(LightSample {
            triangle: light.triangle,
            point,
            normal: material.normal,
            radiance: material.ke,
            pdf,
        })
    }
}
