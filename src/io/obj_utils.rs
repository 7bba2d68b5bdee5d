use std::collections::HashMap;
use std::fs;
use std::path::Path;

use wavefront_obj::{mtl, obj, ParseError};
use std::fmt;
use std::sync::Arc;

use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::spectrum::RGBSpectrum;
use crate::textures::image::ImageTexture;

#[derive(Debug)]
pub enum ObjLoadError {
    Io(std::io::Error),
    Parse(ParseError),
}

impl From<std::io::Error> for ObjLoadError {
    fn from(err: std::io::Error) -> Self {
        ObjLoadError::Io(err)
    }
}

impl From<ParseError> for ObjLoadError {
    fn from(err: ParseError) -> Self {
        ObjLoadError::Parse(err)
    }
}

impl fmt::Display for ObjLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjLoadError::Io(err) => write!(f, "io error: {}", err),
            ObjLoadError::Parse(err) => write!(f, "parse error: {}", err),
        }
    }
}

impl std::error::Error for ObjLoadError {}

// The loader's output: what the renderer consumes from asset files.
// Vertices keep position/normal/uv; each mesh carries one material
// record with an optionally bound diffuse texture.
#[derive(Clone)]
pub struct VertexData {
    pub position: Vector3f,
    pub normal: Vector3f,
    pub uv: Vector2f,
}

#[derive(Clone)]
pub struct MeshMaterial {
    pub ka: RGBSpectrum,
    pub kd: RGBSpectrum,
    pub ks: RGBSpectrum,
    pub ke: RGBSpectrum,
    pub shininess: Float,
    pub texture: Option<Arc<ImageTexture>>,
}

impl Default for MeshMaterial {
    fn default() -> Self {
        Self {
            ka: RGBSpectrum::new(0.2, 0.2, 0.2),
            kd: RGBSpectrum::new(0.5, 0.5, 0.5),
            ks: RGBSpectrum::new(0.7, 0.7, 0.7),
            ke: RGBSpectrum::default(),
            shininess: 1.0,
            texture: None,
        }
    }
}

#[derive(Clone)]
pub struct MeshData {
    pub vertices: Vec<VertexData>,
    pub indices: Vec<u32>,
    pub material: MeshMaterial,
}

pub struct Model {
    pub meshes: Vec<MeshData>,
}

pub fn load_obj_from_str<S: AsRef<str>>(input: S) -> Result<obj::ObjSet, ParseError> {
    let triangulated = triangulate_faces(input.as_ref());
    obj::parse(triangulated)
}

pub fn load_obj_from_file<P: AsRef<Path>>(path: P) -> Result<obj::ObjSet, ObjLoadError> {
    let data = fs::read_to_string(path)?;
    let obj_set = load_obj_from_str(data)?;
    Ok(obj_set)
}

// Load an OBJ together with its material library into the renderer's
// mesh interface. Asset problems below the OBJ itself (missing mtl,
// missing texture file) degrade to defaults with a warning instead of
// failing the load.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model, ObjLoadError> {
    let path = path.as_ref();
    let obj_set = load_obj_from_file(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut mtl_materials: HashMap<String, mtl::Material> = HashMap::new();
    if let Some(library) = &obj_set.material_library {
        let library_path = base_dir.join(library);
        match fs::read_to_string(&library_path) {
            Ok(text) => match mtl::parse(text) {
                Ok(set) => {
                    for material in set.materials {
                        mtl_materials.insert(material.name.clone(), material);
                    }
                }
                Err(err) => log::warn!("failed to parse material library {}: {}",
                                       library_path.display(), err),
            },
            Err(err) => log::warn!("failed to read material library {}: {}",
                                   library_path.display(), err),
        }
    }

    let mut texture_cache: HashMap<String, Option<Arc<ImageTexture>>> = HashMap::new();
    let mut meshes = Vec::new();
    for object in obj_set.objects.iter() {
        for geometry in object.geometry.iter() {
            let material = resolve_material(geometry.material_name.as_deref(),
                                            &mtl_materials,
                                            base_dir,
                                            &mut texture_cache);
            let mesh = mesh_from_geometry(object, geometry, material);
            if !mesh.indices.is_empty() {
                meshes.push(mesh);
            }
        }
    }

    log::info!("Loaded model {} with {} meshes.", path.display(), meshes.len());
    Ok(Model { meshes })
}

fn spectrum_from(color: &mtl::Color) -> RGBSpectrum {
    RGBSpectrum::new(color.r as Float, color.g as Float, color.b as Float)
}

fn resolve_material(name: Option<&str>,
                    materials: &HashMap<String, mtl::Material>,
                    base_dir: &Path,
                    texture_cache: &mut HashMap<String, Option<Arc<ImageTexture>>>) -> MeshMaterial {
    let source = match name {
        Some(name) => match materials.get(name) {
            Some(material) => material,
            None => {
                log::warn!("material {} not found in library, using defaults", name);
                return MeshMaterial::default();
            }
        },
        None => return MeshMaterial::default(),
    };

    let texture = source.diffuse_map.as_ref().and_then(|file| {
        texture_cache
            .entry(file.clone())
            .or_insert_with(|| {
                let texture_path = base_dir.join(file);
                match ImageTexture::from_file(&texture_path.to_string_lossy()) {
                    Ok(texture) => Some(Arc::new(texture)),
                    Err(err) => {
                        // texture absent: fall back to the flat color
                        log::warn!("{}", err);
                        None
                    }
                }
            })
            .clone()
    });

    MeshMaterial {
        ka: spectrum_from(&source.color_ambient),
        kd: spectrum_from(&source.color_diffuse),
        ks: spectrum_from(&source.color_specular),
        ke: source
            .color_emissive
            .as_ref()
            .map(spectrum_from)
            .unwrap_or_default(),
        shininess: source.specular_coefficient as Float,
        texture,
    }
}

fn mesh_from_geometry(object: &obj::Object,
                      geometry: &obj::Geometry,
                      material: MeshMaterial) -> MeshData {
    let mut vertices: Vec<VertexData> = Vec::new();
    let mut has_normal: Vec<bool> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut remap: HashMap<obj::VTNIndex, u32> = HashMap::new();

    for shape in geometry.shapes.iter() {
        let (a, b, c) = match shape.primitive {
            obj::Primitive::Triangle(a, b, c) => (a, b, c),
            _ => continue,
        };
        for vtn in [a, b, c].iter() {
            let index = *remap.entry(*vtn).or_insert_with(|| {
                let v = object.vertices[vtn.0];
                let uv = vtn.1
                    .map(|ti| {
                        let t = object.tex_vertices[ti];
                        Vector2f::new(t.u as Float, t.v as Float)
                    })
                    .unwrap_or_else(|| Vector2f::new(0.0, 0.0));
                let normal = vtn.2
                    .map(|ni| {
                        let n = object.normals[ni];
                        Vector3f::new(n.x as Float, n.y as Float, n.z as Float)
                    })
                    .unwrap_or_else(Vector3f::zeros);

                vertices.push(VertexData {
                    position: Vector3f::new(v.x as Float, v.y as Float, v.z as Float),
                    normal,
                    uv,
                });
                has_normal.push(vtn.2.is_some());
                (vertices.len() - 1) as u32
            });
            indices.push(index);
        }
    }

    if has_normal.iter().any(|present| !present) {
        compute_missing_normals(&mut vertices, &has_normal, &indices);
        log::warn!("object {} is missing normals, computed from faces", object.name);
    }

    MeshData { vertices, indices, material }
}

// Area-weighted vertex normals for vertices the OBJ left bare: the
// unnormalized face cross product accumulates into each corner, so large
// faces dominate, then everything is normalized once.
fn compute_missing_normals(vertices: &mut [VertexData],
                           has_normal: &[bool],
                           indices: &[u32]) {
    for tri in indices.chunks(3) {
        if tri.len() < 3 {
            continue;
        }
        let p0 = vertices[tri[0] as usize].position;
        let p1 = vertices[tri[1] as usize].position;
        let p2 = vertices[tri[2] as usize].position;
        let face = (p1 - p0).cross(&(p2 - p0));

        for &corner in tri.iter() {
            if !has_normal[corner as usize] {
                vertices[corner as usize].normal += face;
            }
        }
    }

    for (vertex, present) in vertices.iter_mut().zip(has_normal.iter()) {
        if !present {
            let norm = vertex.normal.norm();
            if norm > 1e-8 {
                vertex.normal /= norm;
            } else {
                vertex.normal = Vector3f::new(0.0, 1.0, 0.0);
            }
        }
    }
}

fn triangulate_faces(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 4);
    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("f ") || trimmed.starts_with("f\t") {
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() > 4 {
                let base = parts[1];
                for i in 2..(parts.len() - 1) {
                    out.push_str("f ");
                    out.push_str(base);
                    out.push(' ');
                    out.push_str(parts[i]);
                    out.push(' ');
                    out.push_str(parts[i + 1]);
                    out.push('\n');
                }
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
