use std::rc::Rc;

use anyhow::Result;

use crate::assets::TextureLoader;
use crate::camera::PerspectiveCamera;
use crate::config::AppConfig;
use crate::controls::OrbitControls;
use crate::error::{InitError, UNSUPPORTED_MESSAGE};
use crate::input::{DragTracker, PointerInput};
use crate::render::{LabelRenderer, Pipeline, PostComposer, SceneRenderer};
use crate::scene::{self, Scene};

/// CSS size of the browser viewport plus its device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Monotonic elapsed-time source sampled once per frame.
pub struct Clock {
    now: Box<dyn Fn() -> f64>,
    origin: f64,
}

impl Clock {
    /// `now` returns seconds from any fixed epoch.
    pub fn new(now: impl Fn() -> f64 + 'static) -> Self {
        let origin = now();
        Self {
            now: Box::new(now),
            origin,
        }
    }

    pub fn elapsed(&self) -> f64 {
        (self.now)() - self.origin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// Everything the application needs from its surroundings.
///
/// The browser implementation lives in `web`; tests provide their own.
#[allow(async_fn_in_trait)]
pub trait Host {
    type Canvas;
    type Renderer: SceneRenderer;
    type Composer: PostComposer<Self::Renderer>;
    type Labels: LabelRenderer;

    /// Whether a hardware-accelerated context can be created. Must not have side effects.
    fn hardware_rendering_available(&self) -> bool;

    /// Shows a visible, terminal error notice.
    fn report_unsupported(&mut self, message: &str);

    fn find_canvas(&self, selector: &str) -> Option<Self::Canvas>;

    fn viewport(&self) -> Viewport;

    fn texture_loader(&self) -> Rc<dyn TextureLoader>;

    fn clock(&self) -> Clock;

    async fn create_pipeline(
        &mut self,
        canvas: Self::Canvas,
        config: &AppConfig,
        viewport: Viewport,
    ) -> Result<Pipeline<Self::Renderer, Self::Composer, Self::Labels>, InitError>;
}

/// Fully initialized scene, camera and render pipeline.
pub struct App<R, C, L> {
    pub config: AppConfig,
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub pipeline: Pipeline<R, C, L>,
    drag: DragTracker,
    clock: Clock,
    elapsed: f64,
    state: LoopState,
    viewport: Viewport,
}

/// Runs the startup sequence: capability check, canvas lookup, scene,
/// camera and controls, render pipeline, first resize.
///
/// Nothing is constructed when the capability check fails. A surface or
/// device failure shows the same notice as a failed capability check.
pub async fn initialize<H: Host>(
    host: &mut H,
    config: AppConfig,
) -> Result<App<H::Renderer, H::Composer, H::Labels>, InitError> {
    if !host.hardware_rendering_available() {
        host.report_unsupported(UNSUPPORTED_MESSAGE);
        return Err(InitError::Unsupported);
    }

    let Some(canvas) = host.find_canvas(&config.canvas_selector) else {
        log::error!("no element matches `{}`", config.canvas_selector);
        return Err(InitError::MissingCanvas(config.canvas_selector.clone()));
    };

    let loader = host.texture_loader();
    let scene = scene::assemble(&config, loader.as_ref());

    let viewport = host.viewport();
    let camera = PerspectiveCamera::new(&config.camera, viewport.aspect());
    let controls = OrbitControls::new(&config.controls, &camera);

    let pipeline = match host.create_pipeline(canvas, &config, viewport).await {
        Ok(pipeline) => pipeline,
        Err(err) => {
            if err.is_missing_gpu() {
                host.report_unsupported(UNSUPPORTED_MESSAGE);
            }
            return Err(err);
        }
    };

    let mut app = App {
        config,
        scene,
        camera,
        controls,
        pipeline,
        drag: DragTracker::new(),
        clock: host.clock(),
        elapsed: 0.0,
        state: LoopState::Idle,
        viewport,
    };
    app.resize(viewport);
    Ok(app)
}

impl<R, C, L> App<R, C, L>
where
    R: SceneRenderer,
    C: PostComposer<R>,
    L: LabelRenderer,
{
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Marks the frame loop as running. Returns false if it already was.
    pub fn start(&mut self) -> bool {
        match self.state {
            LoopState::Idle => {
                self.state = LoopState::Running;
                log::info!("frame loop started");
                true
            }
            LoopState::Running => false,
        }
    }

    /// Last sampled clock value. Nothing animates from it.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Keeps camera and all three render targets in step with the viewport.
    pub fn resize(&mut self, viewport: Viewport) {
        if !viewport.has_area() {
            log::debug!("ignoring zero-area viewport {}x{}", viewport.width, viewport.height);
            return;
        }
        self.viewport = viewport;
        self.camera.set_aspect(viewport.aspect());
        self.camera.update_projection_matrix();
        let pixel_ratio = viewport.device_pixel_ratio.min(self.config.max_pixel_ratio);
        self.pipeline
            .resize(viewport.width, viewport.height, pixel_ratio);
    }

    pub fn pointer(&mut self, input: PointerInput) {
        self.drag
            .handle(input, &mut self.controls, self.viewport.height as f32);
    }

    /// One iteration: clock, controls, composited scene, labels.
    pub fn frame(&mut self) -> Result<()> {
        self.elapsed = self.clock.elapsed();
        self.controls.update(&mut self.camera);
        self.pipeline.render(&self.scene, &self.camera)
    }
}
