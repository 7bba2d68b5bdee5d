// Copyright @yucwang 2026

use crate::core::rng::LcgRng;
use crate::core::scene::Scene;
use crate::integrators::path::PathIntegrator;
use crate::io::png_utils::ToneMap;
use crate::math::bitmap::Bitmap;
use crate::math::constants::{Float, Vector3f};
use crate::sensors::pinhole::PinholeCamera;

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

const BLOCK_SIZE: usize = 64;

// Accumulating render driver. Each render_pass distributes image blocks
// over a scoped worker pool and folds the finished pass into the running
// per-pixel average, so repeated calls with an unchanged camera keep
// refining the same frame. The caller resets the accumulation when the
// camera moves.
pub struct ProgressiveRenderer {
    frame: Bitmap,
    frames: u32,
    seed: u64,
}

impl ProgressiveRenderer {
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        Self { frame: Bitmap::new(width, height), frames: 0, seed }
    }

    pub fn frame(&self) -> &Bitmap {
        &self.frame
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn max_value(&self) -> Float {
        self.frame.max_value()
    }

    pub fn rgb8(&self, tone: &ToneMap) -> Vec<u8> {
        crate::io::png_utils::to_rgb8(&self.frame, tone)
    }

    pub fn reset(&mut self) {
        self.frame.clear();
        self.frames = 0;
    }

    pub fn render_pass(&mut self,
                       scene: &Scene,
                       camera: &PinholeCamera,
                       integrator: &PathIntegrator) {
        let width = self.frame.width();
        let height = self.frame.height();
        assert_eq!(width, camera.width());
        assert_eq!(height, camera.height());
        if width == 0 || height == 0 {
            return;
        }

        let spp = match integrator.samples_per_pixel() {
            0 => 1,
            v => v,
        };
        let inv_spp = 1.0 / (spp as Float);
        let frame_index = self.frames;
        let base_seed = self.seed;

        let blocks_x = (width + BLOCK_SIZE - 1) / BLOCK_SIZE;
        let blocks_y = (height + BLOCK_SIZE - 1) / BLOCK_SIZE;
        let total_blocks = blocks_x * blocks_y;

        let progress = ProgressBar::new(total_blocks as u64);
        progress.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} blocks")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let next_block = Arc::new(AtomicUsize::new(0));
        let thread_count = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let (tx, rx) = mpsc::channel::<(usize, usize, usize, usize, Vec<Vector3f>)>();
        let mut pass = Bitmap::new(width, height);

        thread::scope(|scope| {
            for _ in 0..thread_count {
                let next_block = Arc::clone(&next_block);
                let tx = tx.clone();
                scope.spawn(move || {
                    loop {
                        let block_index = next_block.fetch_add(1, Ordering::Relaxed);
                        if block_index >= total_blocks {
                            break;
                        }

                        let bx = block_index % blocks_x;
                        let by = block_index / blocks_x;
                        let x0 = bx * BLOCK_SIZE;
                        let y0 = by * BLOCK_SIZE;
                        let x1 = (x0 + BLOCK_SIZE).min(width);
                        let y1 = (y0 + BLOCK_SIZE).min(height);

                        let mut block = vec![Vector3f::zeros(); (x1 - x0) * (y1 - y0)];
                        for y in y0..y1 {
                            for x in x0..x1 {
                                // one generator per pixel and pass, so the
                                // image does not depend on thread count
                                let seed = ((base_seed & 0xFFF) << 48)
                                    | (((frame_index as u64) & 0xFFFF) << 32)
                                    | (((y as u64) & 0xFFFF) << 16)
                                    | ((x as u64) & 0xFFFF);
                                let mut rng = LcgRng::new(seed);

                                let mut color = Vector3f::zeros();
                                for _sample in 0..spp {
                                    let rgb = integrator.trace_pixel(scene, camera, x, y, &mut rng);
                                    color += rgb.to_vector();
                                }
                                let local_x = x - x0;
                                let local_y = y - y0;
                                block[local_x + (x1 - x0) * local_y] = color * inv_spp;
                            }
                        }
                        if tx.send((x0, y0, x1, y1, block)).is_err() {
                            break;
                        }
                    }
                });
            }

            drop(tx);
            for _ in 0..total_blocks {
                if let Ok((x0, y0, x1, y1, block)) = rx.recv() {
                    for y in y0..y1 {
                        for x in x0..x1 {
                            let local_x = x - x0;
                            let local_y = y - y0;
                            pass[(x, y)] = block[local_x + (x1 - x0) * local_y];
                        }
                    }
                    progress.inc(1);
                }
            }
        });
        progress.finish_and_clear();

        self.frame.accumulate(&pass, self.frames);
        self.frames += 1;
    }
}
