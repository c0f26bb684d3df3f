//! Rendering seams and their wgpu implementations.
//!
//! The application only talks to the three traits below, so the frame loop
//! and resize logic run unchanged against the GPU back end in the browser and
//! against recording doubles in tests.

use anyhow::Result;

use crate::camera::PerspectiveCamera;
use crate::scene::Scene;

pub mod bloom;
pub mod gpu;
pub mod sphere;

mod shaders;

pub use bloom::BloomComposer;
pub use gpu::{probe_adapter, GpuRenderer};

/// Primary renderer bound to the visible canvas.
pub trait SceneRenderer {
    /// CSS size of the drawing surface.
    fn set_size(&mut self, width: u32, height: u32);
    fn size(&self) -> (u32, u32);
    fn set_pixel_ratio(&mut self, ratio: f64);
    fn pixel_ratio(&self) -> f64;
}

/// Post-processing chain that renders the scene through `R` and composites the result.
pub trait PostComposer<R: SceneRenderer> {
    fn set_size(&mut self, width: u32, height: u32);
    fn size(&self) -> (u32, u32);
    fn render(&mut self, renderer: &mut R, scene: &Scene, camera: &PerspectiveCamera)
        -> Result<()>;
}

/// Overlay that draws 2D labels on top of the composited frame.
pub trait LabelRenderer {
    fn set_size(&mut self, width: u32, height: u32);
    fn size(&self) -> (u32, u32);
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera);
}

/// The three render targets that must always agree on size.
pub struct Pipeline<R, C, L> {
    pub renderer: R,
    pub composer: C,
    pub labels: L,
}

impl<R, C, L> Pipeline<R, C, L>
where
    R: SceneRenderer,
    C: PostComposer<R>,
    L: LabelRenderer,
{
    pub fn new(renderer: R, composer: C, labels: L) -> Self {
        Self {
            renderer,
            composer,
            labels,
        }
    }

    /// Resizes every target in one step; `pixel_ratio` is applied to the renderer only.
    pub fn resize(&mut self, width: u32, height: u32, pixel_ratio: f64) {
        self.renderer.set_size(width, height);
        self.renderer.set_pixel_ratio(pixel_ratio);
        self.composer.set_size(width, height);
        self.labels.set_size(width, height);
    }

    pub fn sizes(&self) -> [(u32, u32); 3] {
        [self.renderer.size(), self.composer.size(), self.labels.size()]
    }

    /// Composited 3D pass first, labels second so they draw on top.
    pub fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()> {
        self.composer.render(&mut self.renderer, scene, camera)?;
        self.labels.render(scene, camera);
        Ok(())
    }
}

/// Physical pixel extent for a CSS size at the given ratio, never zero.
pub fn physical_size(width: u32, height: u32, pixel_ratio: f64) -> (u32, u32) {
    let scale = |value: u32| ((value as f64 * pixel_ratio).round() as u32).max(1);
    (scale(width), scale(height))
}
