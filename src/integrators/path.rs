// Copyright @yucwang 2026

use crate::core::rng::LcgRng;
use crate::core::scene::{Scene, Shading};
use crate::math::constants::{EPSILON, Float, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::sensors::pinhole::PinholeCamera;

const RR_MIN_DEPTH: u32 = 3;
const RR_MAX_SURVIVAL: Float = 0.95;

pub struct PathIntegrator {
    max_depth: u32,
    samples_per_pixel: u32,
    russian_roulette: bool,
}

impl PathIntegrator {
    pub fn new(max_depth: u32, samples_per_pixel: u32) -> Self {
        Self { max_depth, samples_per_pixel, russian_roulette: true }
    }

    pub fn with_russian_roulette(mut self, enabled: bool) -> Self {
        self.russian_roulette = enabled;
        self
    }

    pub fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    // One path sample through pixel (x, y), jittered for antialiasing.
    pub fn trace_pixel(&self,
                       scene: &Scene,
                       camera: &PinholeCamera,
                       x: usize,
                       y: usize,
                       rng: &mut LcgRng) -> RGBSpectrum {
        let ray = camera.sample_ray(x, y, &rng.next_2d());
        self.li(scene, &ray, 1, rng)
    }

    // Recursive transport estimate. Camera rays enter at depth 1; the
    // depth counter is the only evolving state, so termination follows
    // from the max_depth bound (and, stochastically, from roulette).
    fn li(&self, scene: &Scene, ray: &Ray3f, depth: u32, rng: &mut LcgRng) -> RGBSpectrum {
        let hit = match scene.nearest_hit(ray) {
            Some(hit) => hit,
            None => return scene.background(),
        };
        let shading = scene.shading_at(&hit);
        let wo = -ray.dir();

        let mut radiance = RGBSpectrum::default();

        // Only camera rays see emission directly; everything deeper is
        // already accounted for by the light sampling below.
        if depth <= 1 {
            radiance += shading.brdf.radiance();
        }

        radiance += self.direct_light(scene, &shading, &wo, rng);

        // max_depth counts indirect bounces; 0 renders primary hits with
        // direct lighting only.
        if depth > self.max_depth {
            return radiance;
        }

        let (wi, pdf) = shading.brdf.sample_wi(&shading.normal, &rng.next_2d());
        if pdf <= 0.0 {
            return radiance;
        }
        let f = shading.brdf.f(&wi, &wo, &shading.normal);
        let cos_theta = shading.normal.dot(&wi).max(0.0);
        let mut weight = f * (cos_theta / pdf);

        if self.russian_roulette && depth >= RR_MIN_DEPTH {
            let survival = shading.brdf.albedo().max_channel().min(RR_MAX_SURVIVAL);
            if survival <= 0.0 || rng.next_f32() > survival {
                return radiance;
            }
            weight = weight / survival;
        }

        let origin = shading.point + shading.normal * EPSILON;
        let bounce = Ray3f::new(origin, wi, Some(0.0), None);
        radiance += self.li(scene, &bounce, depth + 1, rng) * weight;

        radiance
    }

    // Next-event estimation: one surface light sampled uniformly, plus
    // every point light. Shadow rays start a small step along the surface
    // normal and exclude the sampled light triangle itself.
    fn direct_light(&self,
                    scene: &Scene,
                    shading: &Shading,
                    wo: &Vector3f,
                    rng: &mut LcgRng) -> RGBSpectrum {
        let mut direct = RGBSpectrum::default();
        let n = shading.normal;
        let offset_origin = shading.point + n * EPSILON;

        if let Some(light) = scene.sample_surface_light(rng) {
            let to_light = light.point - shading.point;
            let dist2 = to_light.norm_squared();
            if dist2 > 0.0 {
                let dist = dist2.sqrt();
                let wl = to_light / dist;

                let cos_surface = n.dot(&wl);
                let cos_light = light.normal.dot(&-wl);
                let geometric = (cos_surface * cos_light).max(0.0);

                if geometric > 0.0
                    && !scene.occluded(&offset_origin, &wl, dist, Some(light.triangle))
                {
                    let f = shading.brdf.f(&wl, wo, &n);
                    direct += light.radiance * f * (geometric / (dist2 * light.pdf));
                }
            }
        }

        for light in scene.point_lights() {
            let to_light = light.position - shading.point;
            let dist2 = to_light.norm_squared();
            if dist2 <= 0.0 {
                continue;
            }
            let dist = dist2.sqrt();
            let wl = to_light / dist;

            let cos_surface = n.dot(&wl).max(0.0);
            if cos_surface <= 0.0 {
                continue;
            }
            if scene.occluded(&offset_origin, &wl, dist, None) {
                continue;
            }

            // softened inverse-square falloff
            let attenuation = 1.0 / (1.0 + dist2);
            let f = shading.brdf.f(&wl, wo, &n);
            direct += light.color * f * (cos_surface * attenuation * light.intensity);
        }

        direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{ BrdfKind, GeometryStore, Material, PointLight, Triangle };
    use crate::math::constants::Vector2f;

    fn material(kind: BrdfKind, kd: RGBSpectrum, ke: RGBSpectrum, normal: Vector3f) -> Material {
        Material {
            kind,
            kd,
            ke,
            normal,
            texture: None,
            uv0: Vector2f::new(0.0, 0.0),
            uv1: Vector2f::new(1.0, 0.0),
            uv2: Vector2f::new(0.0, 1.0),
        }
    }

    // A diffuse floor quad on y=0 with an emissive quad hovering at y=2,
    // facing down. The camera looks straight down from in between.
    fn light_over_floor(emission: Float) -> Scene {
        let size = 2.0;
        let floor = [
            Triangle::new(Vector3f::new(-size, 0.0, -size),
                          Vector3f::new(size, 0.0, -size),
                          Vector3f::new(size, 0.0, size)),
            Triangle::new(Vector3f::new(-size, 0.0, -size),
                          Vector3f::new(size, 0.0, size),
                          Vector3f::new(-size, 0.0, size)),
        ];
        let lamp = [
            Triangle::new(Vector3f::new(-0.5, 2.0, -0.5),
                          Vector3f::new(0.5, 2.0, -0.5),
                          Vector3f::new(0.5, 2.0, 0.5)),
            Triangle::new(Vector3f::new(-0.5, 2.0, -0.5),
                          Vector3f::new(0.5, 2.0, 0.5),
                          Vector3f::new(-0.5, 2.0, 0.5)),
        ];

        let mut triangles = Vec::new();
        let mut materials = Vec::new();
        let mut bounds_min = Vector3f::new(std::f32::MAX, std::f32::MAX, std::f32::MAX);
        let mut bounds_max = Vector3f::new(std::f32::MIN, std::f32::MIN, std::f32::MIN);

        for tri in floor.iter() {
            triangles.push(tri.clone());
            materials.push(material(BrdfKind::Diffuse,
                                    RGBSpectrum::new(0.7, 0.7, 0.7),
                                    RGBSpectrum::default(),
                                    Vector3f::new(0.0, 1.0, 0.0)));
        }
        for tri in lamp.iter() {
            triangles.push(tri.clone());
            materials.push(material(BrdfKind::Emissive,
                                    RGBSpectrum::new(0.0, 0.0, 0.0),
                                    RGBSpectrum::new(emission, emission, emission),
                                    Vector3f::new(0.0, -1.0, 0.0)));
        }
        for tri in triangles.iter() {
            for idx in 0..3 {
                bounds_min[idx] = bounds_min[idx].min(tri.axis_min(idx));
                bounds_max[idx] = bounds_max[idx].max(tri.axis_max(idx));
            }
        }

        let store = GeometryStore { triangles, materials, bounds_min, bounds_max };
        Scene::build(store, Vec::new(), RGBSpectrum::default(), 2)
    }

    fn down_camera() -> PinholeCamera {
        PinholeCamera::new(Vector3f::new(0.0, 1.0, 0.0),
                           Vector3f::new(0.0, 0.0, 0.0),
                           Vector3f::new(0.0, 0.0, 1.0),
                           1.0, 4, 4)
    }

    #[test]
    fn test_empty_scene_is_exactly_background() {
        let background = RGBSpectrum::new(0.25, 0.5, 0.75);
        let store = GeometryStore {
            triangles: Vec::new(),
            materials: Vec::new(),
            bounds_min: Vector3f::new(std::f32::MAX, std::f32::MAX, std::f32::MAX),
            bounds_max: Vector3f::new(std::f32::MIN, std::f32::MIN, std::f32::MIN),
        };
        let scene = Scene::build(store, Vec::new(), background, 8);
        let integrator = PathIntegrator::new(2, 1);
        let camera = down_camera();
        let mut rng = LcgRng::new(1);

        for y in 0..4 {
            for x in 0..4 {
                let c = integrator.trace_pixel(&scene, &camera, x, y, &mut rng);
                assert_eq!(c, background);
            }
        }
    }

    #[test]
    fn test_miss_outside_bounds_is_background() {
        let scene = light_over_floor(5.0);
        let integrator = PathIntegrator::new(2, 1);
        let mut rng = LcgRng::new(9);

        // aimed away from everything
        let ray = Ray3f::new(Vector3f::new(0.0, 10.0, 0.0),
                             Vector3f::new(0.0, 1.0, 0.0),
                             None, None);
        let c = integrator.li(&scene, &ray, 1, &mut rng);
        assert_eq!(c, scene.background());
    }

    #[test]
    fn test_primary_only_floor_is_lit() {
        let scene = light_over_floor(5.0);
        let integrator = PathIntegrator::new(0, 1);
        let camera = down_camera();
        let mut rng = LcgRng::new(5);

        // pixel in the image center looks straight down below the lamp
        let mut lit = RGBSpectrum::default();
        for _ in 0..32 {
            lit += integrator.trace_pixel(&scene, &camera, 2, 2, &mut rng);
        }
        let lit = lit / 32.0;
        assert!(lit[0] > 0.0);
        // grey light over grey floor stays grey
        assert!((lit[0] - lit[1]).abs() < 1e-4);
    }

    #[test]
    fn test_radiance_is_nonnegative() {
        let scene = light_over_floor(5.0);
        let integrator = PathIntegrator::new(3, 1);
        let camera = down_camera();
        let mut rng = LcgRng::new(17);

        for y in 0..4 {
            for x in 0..4 {
                for _ in 0..16 {
                    let c = integrator.trace_pixel(&scene, &camera, x, y, &mut rng);
                    assert!(c[0] >= 0.0 && c[1] >= 0.0 && c[2] >= 0.0);
                }
            }
        }
    }

    #[test]
    fn test_radiance_scales_linearly_with_emission() {
        // With identical seeds both renders consume the same random
        // sequence, so scaling the lamp's emission scales the estimate
        // exactly linearly, well inside any Monte-Carlo tolerance.
        let base = light_over_floor(5.0);
        let scaled = light_over_floor(15.0);
        let integrator = PathIntegrator::new(2, 1);
        let camera = down_camera();

        let mut sum_base = 0.0;
        let mut sum_scaled = 0.0;
        for sample in 0..200 {
            let mut rng_a = LcgRng::new(1000 + sample);
            let mut rng_b = LcgRng::new(1000 + sample);
            sum_base += integrator.trace_pixel(&base, &camera, 2, 2, &mut rng_a)[0];
            sum_scaled += integrator.trace_pixel(&scaled, &camera, 2, 2, &mut rng_b)[0];
        }

        assert!(sum_base > 0.0);
        let ratio = sum_scaled / sum_base;
        assert!((ratio - 3.0).abs() < 0.05, "ratio was {}", ratio);
    }

    #[test]
    fn test_point_light_fallback_without_surface_lights() {
        // floor only, a point light above it, no emissive geometry
        let size = 2.0;
        let triangles = vec![
            Triangle::new(Vector3f::new(-size, 0.0, -size),
                          Vector3f::new(size, 0.0, -size),
                          Vector3f::new(size, 0.0, size)),
        ];
        let materials = vec![material(BrdfKind::Diffuse,
                                      RGBSpectrum::new(0.8, 0.8, 0.8),
                                      RGBSpectrum::default(),
                                      Vector3f::new(0.0, 1.0, 0.0))];
        let store = GeometryStore {
            triangles,
            materials,
            bounds_min: Vector3f::new(-size, 0.0, -size),
            bounds_max: Vector3f::new(size, 0.0, size),
        };
        let lights = vec![PointLight::new(Vector3f::new(0.0, 3.0, 0.0),
                                          RGBSpectrum::new(1.0, 1.0, 1.0),
                                          10.0)];
        let scene = Scene::build(store, lights, RGBSpectrum::default(), 4);

        let integrator = PathIntegrator::new(0, 1);
        let mut rng = LcgRng::new(2);
        let ray = Ray3f::new(Vector3f::new(1.0, 1.0, 0.0),
                             Vector3f::new(0.0, -1.0, 0.0),
                             None, None);
        let c = integrator.li(&scene, &ray, 1, &mut rng);
        assert!(c[0] > 0.0);
    }
}
