// Copyright 2020 TwoCookingMice

use praline::core::geometry::GeometryStore;
use praline::core::scene::Scene;
use praline::integrators::path::PathIntegrator;
use praline::io::exr_utils;
use praline::io::obj_utils;
use praline::io::png_utils::{self, ToneMap};
use praline::io::rtc_utils;
use praline::renderers::progressive::ProgressiveRenderer;
use praline::sensors::pinhole::PinholeCamera;

use std::env;
use std::time::Instant;

fn main() {
    env::set_var("RUST_LOG", "info");
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <scene.rtc> [--spp N] [--max-depth N] [--seed N] [--leaf-size N] [--output PATH]", args[0]);
        std::process::exit(1);
    }

    let input_path = &args[1];
    let mut spp_override: Option<u32> = None;
    let mut max_depth_override: Option<u32> = None;
    let mut seed: u64 = 0;
    let mut leaf_size_override: Option<usize> = None;
    let mut output_override: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--spp" => {
                i += 1;
                spp_override = args.get(i).and_then(|v| v.parse::<u32>().ok());
            }
            "--max-depth" => {
                i += 1;
                max_depth_override = args.get(i).and_then(|v| v.parse::<u32>().ok());
            }
            "--seed" => {
                i += 1;
                seed = args.get(i).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
            }
            "--leaf-size" => {
                i += 1;
                leaf_size_override = args.get(i).and_then(|v| v.parse::<usize>().ok());
            }
            "--output" => {
                i += 1;
                output_override = args.get(i).cloned();
            }
            _ => {}
        }
        i += 1;
    }

    let settings = match rtc_utils::load_settings(input_path) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to load scene {}: {}", input_path, err);
            std::process::exit(1);
        }
    };

    let obj_path = std::path::Path::new(input_path)
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join(&settings.obj_path);
    let model = match obj_utils::load_model(&obj_path) {
        Ok(model) => model,
        Err(err) => {
            eprintln!("failed to load model {}: {}", obj_path.display(), err);
            std::process::exit(1);
        }
    };

    let spp = spp_override.unwrap_or(settings.samples);
    let max_depth = max_depth_override.unwrap_or(settings.max_depth);
    let leaf_size = leaf_size_override.unwrap_or(settings.leaf_size);

    let store = GeometryStore::from_model(&model);
    let scene = Scene::build(store,
                             settings.point_lights.clone(),
                             settings.background,
                             leaf_size);
    let camera = PinholeCamera::new(settings.view_point,
                                    settings.look_at,
                                    settings.up,
                                    settings.yview,
                                    settings.xres,
                                    settings.yres);
    let integrator = PathIntegrator::new(max_depth, spp);
    let mut renderer = ProgressiveRenderer::new(settings.xres, settings.yres, seed);

    log::info!("Rendering {}x{} with {} samples, {} bounces.",
               settings.xres, settings.yres, spp, max_depth);
    let begin = Instant::now();
    renderer.render_pass(&scene, &camera, &integrator);
    log::info!("Render took {:.2} seconds.", begin.elapsed().as_secs_f32());

    let output_path = output_override.unwrap_or_else(|| settings.render_path.clone());
    if output_path.to_ascii_lowercase().ends_with(".exr") {
        exr_utils::write_exr_to_file(&renderer.frame().raw_copy(),
                                     settings.xres,
                                     settings.yres,
                                     &output_path);
    } else if let Err(err) = png_utils::write_to_file(renderer.frame(),
                                                      &ToneMap::default(),
                                                      &output_path) {
        eprintln!("failed to export render: {}", err);
        std::process::exit(1);
    }
}
