// Copyright @yucwang 2026

use std::fmt;
use std::fs;
use std::path::Path;

use crate::core::geometry::PointLight;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;

#[derive(Debug)]
pub enum SceneLoadError {
    Io(std::io::Error),
    Parse(String),
    MissingField(&'static str),
}

impl From<std::io::Error> for SceneLoadError {
    fn from(err: std::io::Error) -> Self {
        SceneLoadError::Io(err)
    }
}

impl fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneLoadError::Io(err) => write!(f, "io error: {}", err),
            SceneLoadError::Parse(message) => write!(f, "parse error: {}", message),
            SceneLoadError::MissingField(field) => write!(f, "missing field: {}", field),
        }
    }
}

impl std::error::Error for SceneLoadError {}

// Parsed scene descriptor. The renderer trusts these values, so every
// range check lives here and a successful load means a valid
// configuration.
#[derive(Debug, Clone)]
pub struct SceneSettings {
    pub obj_path: String,
    pub render_path: String,
    pub max_depth: u32,
    pub xres: usize,
    pub yres: usize,
    pub view_point: Vector3f,
    pub look_at: Vector3f,
    pub up: Vector3f,
    pub yview: Float,
    pub samples: u32,
    pub background: RGBSpectrum,
    pub point_lights: Vec<PointLight>,
    pub leaf_size: usize,
}

// The .rtc format: '#' comment lines, then whitespace-separated fields
//   obj_path render_path k xres yres
//   VP.x VP.y VP.z
//   LA.x LA.y LA.z
//   UP.x UP.y UP.z
//   yview
// followed by any number of single-letter records:
//   L px py pz r g b intensity   (point light, color channels 0-255)
//   S samples
//   B r g b                      (background, linear 0-1)
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<SceneSettings, SceneLoadError> {
    let text = fs::read_to_string(path)?;
    parse_settings(&text)
}

pub fn parse_settings(text: &str) -> Result<SceneSettings, SceneLoadError> {
    let tokens: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| line.split_whitespace())
        .collect();
    let mut cursor = 0usize;

    let obj_path = next_token(&tokens, &mut cursor, "obj path")?.to_string();
    let render_path = next_token(&tokens, &mut cursor, "render path")?.to_string();

    let max_depth = next_number::<i32>(&tokens, &mut cursor, "max depth")?;
    if max_depth < 0 {
        return Err(SceneLoadError::Parse(
            format!("max depth must be non-negative, got {}", max_depth)));
    }

    let xres = next_number::<usize>(&tokens, &mut cursor, "xres")?;
    let yres = next_number::<usize>(&tokens, &mut cursor, "yres")?;
    if xres == 0 || yres == 0 {
        return Err(SceneLoadError::Parse(
            format!("resolution must be positive, got {}x{}", xres, yres)));
    }

    let view_point = next_vector(&tokens, &mut cursor, "view point")?;
    let look_at = next_vector(&tokens, &mut cursor, "look at")?;
    let up = next_vector(&tokens, &mut cursor, "up")?;

    let yview = next_number::<Float>(&tokens, &mut cursor, "yview")?;
    if yview <= 0.0 {
        return Err(SceneLoadError::Parse(
            format!("yview must be positive, got {}", yview)));
    }

    let mut settings = SceneSettings {
        obj_path,
        render_path,
        max_depth: max_depth as u32,
        xres,
        yres,
        view_point,
        look_at,
        up,
        yview,
        samples: 100,
        background: RGBSpectrum::new(0.5, 0.5, 0.5),
        point_lights: Vec::new(),
        leaf_size: 8,
    };

    while cursor < tokens.len() {
        let record = next_token(&tokens, &mut cursor, "record")?;
        match record {
            "L" => {
                let position = next_vector(&tokens, &mut cursor, "light position")?;
                let color = next_vector(&tokens, &mut cursor, "light color")?;
                let intensity = next_number::<Float>(&tokens, &mut cursor, "light intensity")?;
                settings.point_lights.push(PointLight::new(
                    position,
                    RGBSpectrum::from_vector(color / 255.0),
                    intensity,
                ));
            }
            "S" => {
                let samples = next_number::<u32>(&tokens, &mut cursor, "sample count")?;
                if samples == 0 {
                    return Err(SceneLoadError::Parse(
                        String::from("sample count must be positive")));
                }
                settings.samples = samples;
            }
            "B" => {
                let background = next_vector(&tokens, &mut cursor, "background")?;
                settings.background = RGBSpectrum::from_vector(background);
            }
            other => {
                return Err(SceneLoadError::Parse(
                    format!("unknown record: {}", other)));
            }
        }
    }

    Ok(settings)
}

fn next_token<'a>(tokens: &[&'a str],
                  cursor: &mut usize,
                  field: &'static str) -> Result<&'a str, SceneLoadError> {
    let token = tokens
        .get(*cursor)
        .ok_or(SceneLoadError::MissingField(field))?;
    *cursor += 1;
    Ok(token)
}

fn next_number<T: std::str::FromStr>(tokens: &[&str],
                                     cursor: &mut usize,
                                     field: &'static str) -> Result<T, SceneLoadError> {
    let token = next_token(tokens, cursor, field)?;
    token
        .parse::<T>()
        .map_err(|_| SceneLoadError::Parse(format!("invalid {}: {}", field, token)))
}

fn next_vector(tokens: &[&str],
               cursor: &mut usize,
               field: &'static str) -> Result<Vector3f, SceneLoadError> {
    let x = next_number::<Float>(tokens, cursor, field)?;
    let y = next_number::<Float>(tokens, cursor, field)?;
    let z = next_number::<Float>(tokens, cursor, field)?;
    Ok(Vector3f::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = "\
# cornell-style test scene
scene.obj render.png 3 640 480
0.0 1.0 5.0
0.0 1.0 0.0
0.0 1.0 0.0
1.25
L 0.0 3.0 0.0 255 255 255 10.0
S 64
B 0.1 0.2 0.3
";

    #[test]
    fn test_parse_full_descriptor() {
        let settings = parse_settings(EXAMPLE).expect("failed to parse");
        assert_eq!(settings.obj_path, "scene.obj");
        assert_eq!(settings.render_path, "render.png");
        assert_eq!(settings.max_depth, 3);
        assert_eq!(settings.xres, 640);
        assert_eq!(settings.yres, 480);
        assert_eq!(settings.view_point, Vector3f::new(0.0, 1.0, 5.0));
        assert!((settings.yview - 1.25).abs() < 1e-6);
        assert_eq!(settings.samples, 64);
        assert!((settings.background[2] - 0.3).abs() < 1e-6);

        assert_eq!(settings.point_lights.len(), 1);
        let light = &settings.point_lights[0];
        assert_eq!(light.position, Vector3f::new(0.0, 3.0, 0.0));
        assert!((light.color[0] - 1.0).abs() < 1e-6);
        assert!((light.intensity - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_defaults_without_records() {
        let input = "\
scene.obj out.exr 2 4 4
0 0 5
0 0 0
0 1 0
1.0
";
        let settings = parse_settings(input).expect("failed to parse");
        assert_eq!(settings.samples, 100);
        assert_eq!(settings.leaf_size, 8);
        assert!(settings.point_lights.is_empty());
        assert!((settings.background[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_configurations_are_rejected() {
        // negative bounce depth
        let negative_depth = "scene.obj out.png -1 4 4\n0 0 5\n0 0 0\n0 1 0\n1.0\n";
        assert!(parse_settings(negative_depth).is_err());

        // zero resolution
        let zero_res = "scene.obj out.png 2 0 4\n0 0 5\n0 0 0\n0 1 0\n1.0\n";
        assert!(parse_settings(zero_res).is_err());

        // truncated camera block
        let truncated = "scene.obj out.png 2 4 4\n0 0 5\n";
        assert!(matches!(parse_settings(truncated),
                         Err(SceneLoadError::MissingField(_))));

        // unknown trailing record
        let unknown = "scene.obj out.png 2 4 4\n0 0 5\n0 0 0\n0 1 0\n1.0\nQ 1 2 3\n";
        assert!(parse_settings(unknown).is_err());

        // zero samples
        let zero_samples = "scene.obj out.png 2 4 4\n0 0 5\n0 0 0\n0 1 0\n1.0\nS 0\n";
        assert!(parse_settings(zero_samples).is_err());
    }
}
