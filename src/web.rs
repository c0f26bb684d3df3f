#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use glam::Vec2;
use gloo_events::{EventListener, EventListenerOptions};
use image::RgbaImage;
use js_sys::Uint8Array;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    Document, HtmlCanvasElement, HtmlElement, MouseEvent, Response, WheelEvent, Window,
};

use crate::app::{initialize, App, Clock, Host, Viewport};
use crate::assets::{decode_image, TextureHandle, TextureLoader};
use crate::camera::PerspectiveCamera;
use crate::config::AppConfig;
use crate::error::InitError;
use crate::input::{MouseButton, PointerInput};
use crate::labels;
use crate::render::{BloomComposer, GpuRenderer, LabelRenderer, Pipeline};
use crate::scene::Scene;

type BrowserApp = App<GpuRenderer, BloomComposer, DomLabelRenderer>;

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Builds the scene on `canvas.webgl` and runs it until the page goes away.
#[wasm_bindgen]
pub async fn start() -> Result<(), JsValue> {
    let mut host = BrowserHost::new().map_err(to_js)?;
    let app = initialize(&mut host, AppConfig::default())
        .await
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    let app = Rc::new(RefCell::new(app));

    for listener in attach_listeners(&host, &app) {
        listener.forget();
    }
    app.borrow_mut().start();
    schedule_animation_loop(host.window.clone(), app).map_err(to_js)
}

fn to_js(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

fn js_error(err: JsValue) -> anyhow::Error {
    anyhow!("{err:?}")
}

/// The page the scene lives in.
pub struct BrowserHost {
    window: Window,
    document: Document,
}

impl BrowserHost {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| anyhow!("window not available"))?;
        let document = window
            .document()
            .ok_or_else(|| anyhow!("document not available"))?;
        Ok(Self { window, document })
    }
}

impl Host for BrowserHost {
    type Canvas = HtmlCanvasElement;
    type Renderer = GpuRenderer;
    type Composer = BloomComposer;
    type Labels = DomLabelRenderer;

    fn hardware_rendering_available(&self) -> bool {
        let Ok(scratch) = self.document.create_element("canvas") else {
            return false;
        };
        let Ok(canvas) = scratch.dyn_into::<HtmlCanvasElement>() else {
            return false;
        };
        // the GL backend needs WebGL2; a WebGL1-only browser cannot create the surface
        matches!(canvas.get_context("webgl2"), Ok(Some(_)))
    }

    fn report_unsupported(&mut self, message: &str) {
        log::error!("{message}");
        let notice = self
            .document
            .create_element("div")
            .and_then(|notice| {
                notice.set_class_name("webgl-error");
                notice.set_text_content(Some(message));
                let body = self
                    .document
                    .body()
                    .ok_or_else(|| JsValue::from_str("document has no body"))?;
                body.append_child(&notice)
            });
        if let Err(err) = notice {
            log::error!("unable to show error notice: {err:?}");
        }
    }

    fn find_canvas(&self, selector: &str) -> Option<HtmlCanvasElement> {
        self.document
            .query_selector(selector)
            .ok()
            .flatten()?
            .dyn_into::<HtmlCanvasElement>()
            .ok()
    }

    fn viewport(&self) -> Viewport {
        viewport_of(&self.window)
    }

    fn texture_loader(&self) -> Rc<dyn TextureLoader> {
        Rc::new(FetchTextureLoader)
    }

    fn clock(&self) -> Clock {
        let performance = self.window.performance();
        Clock::new(move || performance.as_ref().map_or(0.0, |p| p.now() / 1000.0))
    }

    async fn create_pipeline(
        &mut self,
        canvas: HtmlCanvasElement,
        config: &AppConfig,
        viewport: Viewport,
    ) -> Result<Pipeline<GpuRenderer, BloomComposer, DomLabelRenderer>, InitError> {
        let size = (viewport.width, viewport.height);
        let renderer = GpuRenderer::for_canvas(canvas, size, config.color_management).await?;
        let composer = BloomComposer::new(config.bloom, size);
        let labels = DomLabelRenderer::new(&self.document, size)
            .map_err(|err| InitError::Dom(format!("{err:?}")))?;
        Ok(Pipeline::new(renderer, composer, labels))
    }
}

fn viewport_of(window: &Window) -> Viewport {
    let dimension = |value: Result<JsValue, JsValue>| {
        value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0).max(0.0) as u32
    };
    Viewport::new(
        dimension(window.inner_width()),
        dimension(window.inner_height()),
        window.device_pixel_ratio(),
    )
}

/// Fetches textures in the background; handles start out pending.
struct FetchTextureLoader;

impl TextureLoader for FetchTextureLoader {
    fn load(&self, path: &str) -> TextureHandle {
        let handle = TextureHandle::pending(path);
        let pending = handle.clone();
        let url = path.to_string();
        spawn_local(async move {
            match fetch_image(&url).await {
                Ok(image) => pending.fulfill(image),
                Err(err) => pending.fail(format!("{err:#}")),
            }
        });
        handle
    }
}

async fn fetch_image(url: &str) -> Result<RgbaImage> {
    let window = web_sys::window().ok_or_else(|| anyhow!("window not available"))?;
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(js_error)?
        .dyn_into()
        .map_err(js_error)?;
    if !response.ok() {
        bail!("HTTP {} for {url}", response.status());
    }
    let buffer = JsFuture::from(response.array_buffer().map_err(js_error)?)
        .await
        .map_err(js_error)?;
    decode_image(&Uint8Array::new(&buffer).to_vec())
}

/// Absolutely positioned overlay holding one `<div>` per label.
pub struct DomLabelRenderer {
    document: Document,
    overlay: HtmlElement,
    nodes: Vec<HtmlElement>,
    size: (u32, u32),
}

impl DomLabelRenderer {
    fn new(document: &Document, size: (u32, u32)) -> Result<Self, JsValue> {
        let overlay: HtmlElement = document.create_element("div")?.dyn_into()?;
        let style = overlay.style();
        style.set_property("position", "absolute")?;
        style.set_property("top", "0px")?;
        style.set_property("left", "0px")?;
        style.set_property("overflow", "hidden")?;
        style.set_property("pointer-events", "none")?;
        document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?
            .append_child(&overlay)?;

        let mut labels = Self {
            document: document.clone(),
            overlay,
            nodes: Vec::new(),
            size: (0, 0),
        };
        labels.set_size(size.0, size.1);
        Ok(labels)
    }

    fn ensure_nodes(&mut self, count: usize) -> Result<(), JsValue> {
        while self.nodes.len() < count {
            let node: HtmlElement = self.document.create_element("div")?.dyn_into()?;
            node.set_class_name("label");
            node.style().set_property("position", "absolute")?;
            self.overlay.append_child(&node)?;
            self.nodes.push(node);
        }
        Ok(())
    }

    fn place(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), JsValue> {
        let placements = labels::layout(scene, camera, self.size);
        self.ensure_nodes(placements.len())?;
        for (node, placement) in self.nodes.iter().zip(&placements) {
            if node.text_content().as_deref() != Some(placement.text.as_str()) {
                node.set_text_content(Some(&placement.text));
            }
            let style = node.style();
            if !placement.visible {
                style.set_property("display", "none")?;
                continue;
            }
            style.set_property("display", "")?;
            style.set_property(
                "transform",
                &format!(
                    "translate(-50%, -50%) translate({}px, {}px)",
                    placement.screen.x, placement.screen.y
                ),
            )?;
            style.set_property("z-index", &placement.z_index.to_string())?;
        }
        Ok(())
    }
}

impl LabelRenderer for DomLabelRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        let style = self.overlay.style();
        let result = style
            .set_property("width", &format!("{width}px"))
            .and_then(|_| style.set_property("height", &format!("{height}px")));
        if let Err(err) = result {
            log::warn!("unable to size label overlay: {err:?}");
        }
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) {
        if let Err(err) = self.place(scene, camera) {
            log::warn!("label update failed: {err:?}");
        }
    }
}

/// Resize on the window; drag and wheel on the canvas. Releasing the button
/// anywhere on the page ends a drag.
fn attach_listeners(host: &BrowserHost, app: &Rc<RefCell<BrowserApp>>) -> Vec<EventListener> {
    let mut listeners = Vec::new();
    let canvas = app.borrow().pipeline.renderer.canvas().clone();

    {
        let app = Rc::clone(app);
        let window = host.window.clone();
        listeners.push(EventListener::new(&host.window, "resize", move |_| {
            app.borrow_mut().resize(viewport_of(&window));
        }));
    }

    {
        let app = Rc::clone(app);
        listeners.push(EventListener::new(&canvas, "pointerdown", move |event| {
            let Some(event) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            app.borrow_mut().pointer(PointerInput::Down {
                button: MouseButton::new(event.button() as u8),
                position: client_position(event),
            });
        }));
    }

    {
        let app = Rc::clone(app);
        listeners.push(EventListener::new(&host.window, "pointermove", move |event| {
            let Some(event) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            app.borrow_mut().pointer(PointerInput::Move {
                position: client_position(event),
            });
        }));
    }

    {
        let app = Rc::clone(app);
        listeners.push(EventListener::new(&host.window, "pointerup", move |event| {
            let Some(event) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            app.borrow_mut().pointer(PointerInput::Up {
                button: MouseButton::new(event.button() as u8),
            });
        }));
    }

    {
        let app = Rc::clone(app);
        let options = EventListenerOptions::enable_prevent_default();
        listeners.push(EventListener::new_with_options(
            &canvas,
            "wheel",
            options,
            move |event| {
                let Some(event) = event.dyn_ref::<WheelEvent>() else {
                    return;
                };
                event.prevent_default();
                app.borrow_mut().pointer(PointerInput::Wheel {
                    delta_y: event.delta_y() as f32,
                });
            },
        ));
    }

    listeners
}

fn client_position(event: &MouseEvent) -> Vec2 {
    Vec2::new(event.client_x() as f32, event.client_y() as f32)
}

/// Drives `App::frame` from `requestAnimationFrame` forever.
///
/// The callback owns a handle to itself so it outlives this function; render
/// errors are logged and the next frame is still requested.
fn schedule_animation_loop(window: Window, app: Rc<RefCell<BrowserApp>>) -> Result<()> {
    let slot: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let next = Rc::clone(&slot);
    let frame_window = window.clone();

    let closure = Closure::wrap(Box::new(move || {
        if let Err(err) = app.borrow_mut().frame() {
            log::error!("frame failed: {err:#}");
        }
        if let Some(callback) = next.borrow().as_ref() {
            if let Err(err) = request_frame(&frame_window, callback) {
                log::error!("{err:#}");
            }
        }
    }) as Box<dyn FnMut()>);

    request_frame(&window, &closure)?;
    *slot.borrow_mut() = Some(closure);
    Ok(())
}

fn request_frame(window: &Window, callback: &Closure<dyn FnMut()>) -> Result<()> {
    window
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))?;
    Ok(())
}
