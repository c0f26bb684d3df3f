//! A decorative solar system for the browser.
//!
//! The sun and four planets sit in a fixed line, wrapped in a cube-mapped
//! starfield and lit by a point light inside the sun. The frame loop only
//! moves the camera: orbit controls, a bloom pass and DOM labels.
//!
//! Everything that touches the page goes through [`app::Host`], so the
//! startup sequence, resize handling and frame ordering run headless in
//! tests. The browser host lives in `web` and is compiled for wasm32 only.

pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod controls;
pub mod error;
pub mod input;
pub mod labels;
pub mod render;
pub mod scene;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::{initialize, App, Clock, Host, LoopState, Viewport};
pub use assets::{CubeTexture, TextureHandle, TextureLoader, TextureState};
pub use camera::PerspectiveCamera;
pub use config::AppConfig;
pub use controls::OrbitControls;
pub use error::{InitError, UNSUPPORTED_MESSAGE};
pub use input::{DragTracker, MouseButton, PointerInput};
pub use render::{LabelRenderer, Pipeline, PostComposer, SceneRenderer};
pub use scene::{Body, Label, Light, Scene, Shading};
