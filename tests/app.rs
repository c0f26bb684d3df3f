use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{anyhow, Result};
use glam::{Vec2, Vec3};
use pollster::block_on;

use solar_scene::{
    initialize, App, AppConfig, Clock, Host, InitError, LabelRenderer, Light, LoopState,
    MouseButton, PerspectiveCamera, Pipeline, PointerInput, PostComposer, Scene, SceneRenderer,
    Shading, TextureHandle, TextureLoader, TextureState, Viewport, UNSUPPORTED_MESSAGE,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Composite(Vec3),
    Labels(Vec3),
}

type CallLog = Rc<RefCell<Vec<Call>>>;

#[derive(Default)]
struct MockRenderer {
    size: (u32, u32),
    ratio: f64,
}

impl SceneRenderer for MockRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.ratio = ratio;
    }

    fn pixel_ratio(&self) -> f64 {
        self.ratio
    }
}

struct MockComposer {
    size: (u32, u32),
    calls: CallLog,
    fail: bool,
}

impl PostComposer<MockRenderer> for MockComposer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn render(
        &mut self,
        _renderer: &mut MockRenderer,
        _scene: &Scene,
        camera: &PerspectiveCamera,
    ) -> Result<()> {
        if self.fail {
            return Err(anyhow!("surface lost"));
        }
        self.calls.borrow_mut().push(Call::Composite(camera.position));
        Ok(())
    }
}

struct MockLabels {
    size: (u32, u32),
    calls: CallLog,
}

impl LabelRenderer for MockLabels {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn render(&mut self, _scene: &Scene, camera: &PerspectiveCamera) {
        self.calls.borrow_mut().push(Call::Labels(camera.position));
    }
}

/// Records requested paths and settles each texture according to `fail`.
#[derive(Default)]
struct RecordingLoader {
    requested: RefCell<Vec<String>>,
    fail: bool,
}

impl TextureLoader for RecordingLoader {
    fn load(&self, path: &str) -> TextureHandle {
        self.requested.borrow_mut().push(path.to_string());
        let handle = TextureHandle::pending(path);
        if self.fail {
            handle.fail("404 Not Found");
        }
        handle
    }
}

struct MockHost {
    hardware: bool,
    canvas: bool,
    composer_fails: bool,
    pipeline_error: Option<fn() -> InitError>,
    viewport: Viewport,
    notices: Vec<String>,
    pipelines_created: usize,
    loader: Rc<RecordingLoader>,
    calls: CallLog,
    now: Rc<Cell<f64>>,
}

impl MockHost {
    fn new() -> Self {
        Self {
            hardware: true,
            canvas: true,
            composer_fails: false,
            pipeline_error: None,
            viewport: Viewport::new(1024, 768, 1.0),
            notices: Vec::new(),
            pipelines_created: 0,
            loader: Rc::new(RecordingLoader::default()),
            calls: Rc::default(),
            now: Rc::new(Cell::new(100.0)),
        }
    }
}

impl Host for MockHost {
    type Canvas = ();
    type Renderer = MockRenderer;
    type Composer = MockComposer;
    type Labels = MockLabels;

    fn hardware_rendering_available(&self) -> bool {
        self.hardware
    }

    fn report_unsupported(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn find_canvas(&self, selector: &str) -> Option<()> {
        assert_eq!(selector, "canvas.webgl");
        self.canvas.then_some(())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn texture_loader(&self) -> Rc<dyn TextureLoader> {
        self.loader.clone()
    }

    fn clock(&self) -> Clock {
        let now = Rc::clone(&self.now);
        Clock::new(move || now.get())
    }

    async fn create_pipeline(
        &mut self,
        _canvas: (),
        _config: &AppConfig,
        _viewport: Viewport,
    ) -> Result<Pipeline<MockRenderer, MockComposer, MockLabels>, InitError> {
        self.pipelines_created += 1;
        if let Some(error) = self.pipeline_error {
            return Err(error());
        }
        Ok(Pipeline::new(
            MockRenderer::default(),
            MockComposer {
                size: (0, 0),
                calls: Rc::clone(&self.calls),
                fail: self.composer_fails,
            },
            MockLabels {
                size: (0, 0),
                calls: Rc::clone(&self.calls),
            },
        ))
    }
}

type MockApp = App<MockRenderer, MockComposer, MockLabels>;

fn config() -> AppConfig {
    AppConfig::default().with_base_url("/solar/")
}

fn start(host: &mut MockHost) -> MockApp {
    block_on(initialize(host, config())).expect("initialization succeeds")
}

#[test]
fn missing_hardware_support_aborts_before_anything_is_built() {
    let mut host = MockHost::new();
    host.hardware = false;

    let err = block_on(initialize(&mut host, config())).err().expect("must fail");

    assert!(matches!(err, InitError::Unsupported));
    assert_eq!(host.notices, [UNSUPPORTED_MESSAGE]);
    assert_eq!(host.pipelines_created, 0);
    assert!(host.loader.requested.borrow().is_empty());
}

#[test]
fn missing_canvas_is_reported() {
    let mut host = MockHost::new();
    host.canvas = false;

    let err = block_on(initialize(&mut host, config())).err().expect("must fail");

    assert!(matches!(err, InitError::MissingCanvas(ref selector) if selector == "canvas.webgl"));
    assert!(host.notices.is_empty());
    assert_eq!(host.pipelines_created, 0);
}

#[test]
fn surface_failure_shows_the_unsupported_notice() {
    let mut host = MockHost::new();
    host.pipeline_error = Some(|| InitError::Surface("webgl2 context unavailable".into()));

    let err = block_on(initialize(&mut host, config())).err().expect("must fail");

    assert!(matches!(err, InitError::Surface(_)));
    assert_eq!(host.notices, [UNSUPPORTED_MESSAGE]);
    assert_eq!(host.pipelines_created, 1);
}

#[test]
fn device_failure_shows_the_unsupported_notice() {
    let mut host = MockHost::new();
    host.pipeline_error = Some(|| InitError::Device("no adapter".into()));

    let err = block_on(initialize(&mut host, config())).err().expect("must fail");

    assert!(matches!(err, InitError::Device(_)));
    assert_eq!(host.notices, [UNSUPPORTED_MESSAGE]);
}

#[test]
fn dom_failure_during_pipeline_setup_shows_no_notice() {
    let mut host = MockHost::new();
    host.pipeline_error = Some(|| InitError::Dom("canvas detached".into()));

    assert!(block_on(initialize(&mut host, config())).is_err());
    assert!(host.notices.is_empty());
}

#[test]
fn scene_holds_sun_four_planets_and_two_lights() {
    let mut host = MockHost::new();
    let app = start(&mut host);
    let scene = &app.scene;

    let names: Vec<_> = scene.bodies.iter().map(|body| body.name.as_str()).collect();
    assert_eq!(names, ["Sun", "Mercury", "Venus", "Earth", "Mars"]);

    let sun = scene.body("Sun").unwrap();
    assert_eq!(sun.radius, 5.0);
    assert_eq!(sun.position, Vec3::ZERO);
    assert_eq!(sun.shading, Shading::Unlit);
    assert!(sun.label.is_none());

    let expected = [
        ("Mercury", 0.5, 10.0),
        ("Venus", 0.9, 15.0),
        ("Earth", 1.0, 20.0),
        ("Mars", 0.7, 25.0),
    ];
    for (name, radius, x) in expected {
        let body = scene.body(name).unwrap();
        assert_eq!(body.radius, radius);
        assert_eq!(body.position, Vec3::new(x, 0.0, 0.0));
        assert_eq!(body.shading, Shading::Lit);
        let label = body.label.as_ref().unwrap();
        assert_eq!(label.text, name);
        assert!((label.offset - Vec3::new(0.0, radius + 0.5, 0.0)).length() < 1e-6);
    }

    assert_eq!(scene.lights.len(), 2);
    assert!(matches!(scene.lights[0], Light::Ambient { intensity, .. } if intensity == 0.2));
    assert!(matches!(
        scene.lights[1],
        Light::Point { intensity, position, .. } if intensity == 1.0 && position == Vec3::ZERO
    ));
}

#[test]
fn assets_are_requested_under_the_base_url() {
    let mut host = MockHost::new();
    let _app = start(&mut host);

    let requested = host.loader.requested.borrow();
    assert_eq!(requested.len(), 10);
    assert_eq!(requested[0], "/solar/textures/environment/px.jpg");
    assert_eq!(requested[5], "/solar/textures/environment/nz.jpg");
    assert!(requested.contains(&"/solar/textures/earth.jpg".to_string()));
}

#[test]
fn failed_textures_do_not_stop_assembly() {
    let mut host = MockHost::new();
    host.loader = Rc::new(RecordingLoader {
        fail: true,
        ..RecordingLoader::default()
    });

    let mut app = start(&mut host);

    let earth = app.scene.body("Earth").unwrap();
    let texture = earth.texture.as_ref().unwrap();
    assert!(matches!(texture.state(), TextureState::Failed(_)));
    assert!(app.scene.background.is_settled());
    app.frame().unwrap();
}

#[test]
fn initialization_sizes_every_target_to_the_viewport() {
    let mut host = MockHost::new();
    let app = start(&mut host);

    assert_eq!(app.pipeline.sizes(), [(1024, 768); 3]);
    assert!((app.camera.aspect - 1024.0 / 768.0).abs() < 1e-6);
    assert_eq!(app.state(), LoopState::Idle);
}

#[test]
fn resize_updates_camera_and_all_targets() {
    let mut host = MockHost::new();
    let mut app = start(&mut host);
    let before = app.camera.projection();

    app.resize(Viewport::new(800, 600, 3.0));

    assert!((app.camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    assert_ne!(app.camera.projection(), before);
    assert_eq!(app.pipeline.sizes(), [(800, 600); 3]);
    assert_eq!(app.pipeline.renderer.pixel_ratio(), 2.0);

    app.resize(Viewport::new(800, 600, 1.5));
    assert_eq!(app.pipeline.renderer.pixel_ratio(), 1.5);
}

#[test]
fn zero_area_resize_is_ignored() {
    let mut host = MockHost::new();
    let mut app = start(&mut host);

    app.resize(Viewport::new(0, 600, 1.0));

    assert_eq!(app.pipeline.sizes(), [(1024, 768); 3]);
    assert!((app.camera.aspect - 1024.0 / 768.0).abs() < 1e-6);
    assert_eq!(app.viewport(), Viewport::new(1024, 768, 1.0));
}

#[test]
fn loop_starts_once() {
    let mut host = MockHost::new();
    let mut app = start(&mut host);

    assert!(app.start());
    assert_eq!(app.state(), LoopState::Running);
    assert!(!app.start());
}

#[test]
fn frame_updates_controls_then_composites_then_draws_labels() {
    let mut host = MockHost::new();
    let mut app = start(&mut host);
    let initial = app.camera.position;

    app.pointer(PointerInput::Down {
        button: MouseButton::PRIMARY,
        position: Vec2::new(100.0, 100.0),
    });
    app.pointer(PointerInput::Move {
        position: Vec2::new(300.0, 100.0),
    });
    app.pointer(PointerInput::Up {
        button: MouseButton::PRIMARY,
    });
    app.frame().unwrap();

    let calls = host.calls.borrow();
    assert_eq!(calls.len(), 2);
    let (Call::Composite(composited), Call::Labels(labelled)) = (&calls[0], &calls[1]) else {
        panic!("unexpected call order: {calls:?}");
    };
    // both passes see the camera after this frame's controls update
    assert_ne!(*composited, initial);
    assert_eq!(composited, labelled);
}

#[test]
fn frame_samples_the_clock() {
    let mut host = MockHost::new();
    let mut app = start(&mut host);

    host.now.set(101.25);
    app.frame().unwrap();

    assert!((app.elapsed() - 1.25).abs() < 1e-9);
}

#[test]
fn render_errors_skip_the_label_pass() {
    let mut host = MockHost::new();
    host.composer_fails = true;
    let mut app = start(&mut host);

    assert!(app.frame().is_err());
    assert!(host.calls.borrow().is_empty());
}
