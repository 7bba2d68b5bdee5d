// Copyright @yucwang 2026

use crate::io::obj_utils::Model;
use crate::math::constants::{ Float, Vector2f, Vector3f, FLOAT_MAX, FLOAT_MIN };
use crate::math::spectrum::RGBSpectrum;
use crate::textures::image::ImageTexture;

use std::sync::Arc;

// One triangle, world-space corner positions copied out of the source
// mesh. Everything else refers to triangles by index into the store.
#[derive(Debug, Clone)]
pub struct Triangle {
    pub p0: Vector3f,
    pub p1: Vector3f,
    pub p2: Vector3f,
}

impl Triangle {
    pub fn new(p0: Vector3f, p1: Vector3f, p2: Vector3f) -> Self {
        Self { p0, p1, p2 }
    }

    pub fn axis_min(&self, axis: usize) -> Float {
        self.p0[axis].min(self.p1[axis]).min(self.p2[axis])
    }

    pub fn axis_max(&self, axis: usize) -> Float {
        self.p0[axis].max(self.p1[axis]).max(self.p2[axis])
    }

    pub fn surface_area(&self) -> Float {
        0.5 * (self.p1 - self.p0).cross(&(self.p2 - self.p0)).norm()
    }

    pub fn point_at(&self, u: Float, v: Float) -> Vector3f {
        self.p0 * (1.0 - u - v) + self.p1 * u + self.p2 * v
    }

    // Moeller-Trumbore. Returns (t, u, v) with the barycentric convention
    // p = (1-u-v)*p0 + u*p1 + v*p2. Near-zero determinants (parallel or
    // degenerate triangles) report no hit.
    pub fn intersect(&self, origin: &Vector3f, dir: &Vector3f) -> Option<(Float, Float, Float)> {
        let e1 = self.p1 - self.p0;
        let e2 = self.p2 - self.p0;

        let pvec = dir.cross(&e2);
        let det = e1.dot(&pvec);
        if det.abs() < 1e-8 {
            return None;
        }

        let inv_det = 1.0 / det;
        let tvec = origin - self.p0;
        let u = tvec.dot(&pvec) * inv_det;
        if u < 0.0 || u > 1.0 {
            return None;
        }

        let qvec = tvec.cross(&e1);
        let v = dir.dot(&qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = e2.dot(&qvec) * inv_det;
        if t < 0.0 {
            return None;
        }

        Some((t, u, v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrdfKind {
    Diffuse,
    Emissive,
}

// Per-triangle shading record, same index space as the triangle list.
// The normal is the averaged vertex normal; texture coordinates keep
// their three corners for barycentric lookup.
#[derive(Clone)]
pub struct Material {
    pub kind: BrdfKind,
    pub kd: RGBSpectrum,
    pub ke: RGBSpectrum,
    pub normal: Vector3f,
    pub texture: Option<Arc<ImageTexture>>,
    pub uv0: Vector2f,
    pub uv1: Vector2f,
    pub uv2: Vector2f,
}

impl Material {
    pub fn uv_at(&self, u: Float, v: Float) -> Vector2f {
        self.uv0 * (1.0 - u - v) + self.uv1 * u + self.uv2 * v
    }

    // Diffuse reflectance at a hit: texture lookup when a diffuse map is
    // bound, flat material color otherwise.
    pub fn albedo_at(&self, u: Float, v: Float) -> RGBSpectrum {
        match &self.texture {
            Some(texture) => texture.eval(self.uv_at(u, v)),
            None => self.kd,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SurfaceLight {
    pub triangle: u32,
    pub area: Float,
}

#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub position: Vector3f,
    pub color: RGBSpectrum,
    pub intensity: Float,
}

impl PointLight {
    pub fn new(position: Vector3f, color: RGBSpectrum, intensity: Float) -> Self {
        Self { position, color, intensity }
    }
}

pub struct GeometryStore {
    pub triangles: Vec<Triangle>,
    pub materials: Vec<Material>,
    pub bounds_min: Vector3f,
    pub bounds_max: Vector3f,
}

impl GeometryStore {
    // Flatten every mesh of the loaded model into one triangle array with
    // a matching material array. Vertex data is duplicated per triangle;
    // the index lists of the source meshes do not survive flattening.
    pub fn from_model(model: &Model) -> Self {
        let mut triangles = Vec::new();
        let mut materials = Vec::new();
        let mut bounds_min = Vector3f::new(FLOAT_MAX, FLOAT_MAX, FLOAT_MAX);
        let mut bounds_max = Vector3f::new(FLOAT_MIN, FLOAT_MIN, FLOAT_MIN);

        for mesh in model.meshes.iter() {
            let emissive = !mesh.material.ke.is_black();
            let kind = if emissive { BrdfKind::Emissive } else { BrdfKind::Diffuse };

            for tri in mesh.indices.chunks(3) {
                if tri.len() < 3 {
                    continue;
                }
                let v0 = &mesh.vertices[tri[0] as usize];
                let v1 = &mesh.vertices[tri[1] as usize];
                let v2 = &mesh.vertices[tri[2] as usize];

                let triangle = Triangle::new(v0.position, v1.position, v2.position);
                for idx in 0..3 {
                    bounds_min[idx] = bounds_min[idx].min(triangle.axis_min(idx));
                    bounds_max[idx] = bounds_max[idx].max(triangle.axis_max(idx));
                }

                let mut normal = v0.normal + v1.normal + v2.normal;
                if normal.norm() < 1e-8 {
                    normal = (v1.position - v0.position)
                        .cross(&(v2.position - v0.position));
                }
                let normal = if normal.norm() > 0.0 {
                    normal.normalize()
                } else {
                    Vector3f::new(0.0, 1.0, 0.0)
                };

                triangles.push(triangle);
                materials.push(Material {
                    kind,
                    kd: mesh.material.kd,
                    ke: mesh.material.ke,
                    normal,
                    texture: mesh.material.texture.clone(),
                    uv0: v0.uv,
                    uv1: v1.uv,
                    uv2: v2.uv,
                });
            }
        }

        log::info!("Geometry store holds {} triangles.", triangles.len());

        Self { triangles, materials, bounds_min, bounds_max }
    }

    // Every emissive triangle becomes a surface light, with its area
    // precomputed for the sampling pdf.
    pub fn surface_lights(&self) -> Vec<SurfaceLight> {
        let mut lights = Vec::new();
        for (idx, material) in self.materials.iter().enumerate() {
            if material.kind == BrdfKind::Emissive {
                let area = self.triangles[idx].surface_area();
                if area > 0.0 {
                    lights.push(SurfaceLight { triangle: idx as u32, area });
                }
            }
        }

        lights
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}
