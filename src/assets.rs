use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use anyhow::{Context, Result};
use image::RgbaImage;

/// Load progress of a texture.
#[derive(Debug, Clone)]
pub enum TextureState {
    Pending,
    Ready(Rc<RgbaImage>),
    Failed(String),
}

impl TextureState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
struct TextureSlot {
    state: TextureState,
    generation: u64,
}

/// Placeholder returned immediately by a [`TextureLoader`].
///
/// The loader fills it in place once the image arrives; consumers poll
/// [`TextureHandle::generation`] to notice the change.
#[derive(Clone)]
pub struct TextureHandle {
    path: Rc<str>,
    slot: Rc<RefCell<TextureSlot>>,
}

impl TextureHandle {
    pub fn pending(path: &str) -> Self {
        Self {
            path: Rc::from(path),
            slot: Rc::new(RefCell::new(TextureSlot {
                state: TextureState::Pending,
                generation: 0,
            })),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stable identity shared by every clone of this handle.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.slot) as *const () as usize
    }

    pub fn state(&self) -> TextureState {
        self.slot.borrow().state.clone()
    }

    pub fn generation(&self) -> u64 {
        self.slot.borrow().generation
    }

    pub fn fulfill(&self, image: RgbaImage) {
        self.set(TextureState::Ready(Rc::new(image)));
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("texture {} unavailable: {reason}", self.path);
        self.set(TextureState::Failed(reason));
    }

    fn set(&self, state: TextureState) {
        let mut slot = self.slot.borrow_mut();
        slot.state = state;
        slot.generation += 1;
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("path", &self.path)
            .field("state", &self.slot.borrow().state.label())
            .finish()
    }
}

/// Starts a non-blocking texture load and hands back its placeholder.
pub trait TextureLoader {
    fn load(&self, path: &str) -> TextureHandle;
}

/// Decodes an encoded image (JPEG or PNG) into RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes).context("failed to decode image")?;
    Ok(image.to_rgba8())
}

/// Face file names in +X, -X, +Y, -Y, +Z, -Z order.
pub const CUBE_FACES: [&str; 6] = ["px.jpg", "nx.jpg", "py.jpg", "ny.jpg", "pz.jpg", "nz.jpg"];

/// Six-face environment texture used as the scene background.
#[derive(Debug, Clone)]
pub struct CubeTexture {
    pub faces: [TextureHandle; 6],
}

impl CubeTexture {
    /// Requests the six faces found under `base`. Missing files are not an error.
    pub fn load(base: &str, loader: &dyn TextureLoader) -> Self {
        let faces = CUBE_FACES.map(|face| loader.load(&format!("{base}{face}")));
        Self { faces }
    }

    pub fn is_settled(&self) -> bool {
        self.faces.iter().all(|face| !face.state().is_pending())
    }

    /// Sum of face generations, changes whenever any face settles.
    pub fn generation(&self) -> u64 {
        self.faces.iter().map(TextureHandle::generation).sum()
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::FsTextureLoader;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use anyhow::Context;

    use super::{decode_image, TextureHandle, TextureLoader};

    /// Reads textures from a directory standing in for the web root.
    ///
    /// The URL's base prefix is stripped so `/solar/textures/earth.jpg`
    /// resolves to `<root>/textures/earth.jpg`.
    #[derive(Debug, Clone)]
    pub struct FsTextureLoader {
        root: PathBuf,
        base_url: String,
    }

    impl FsTextureLoader {
        pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
            Self {
                root: root.into(),
                base_url: base_url.to_string(),
            }
        }

        fn resolve(&self, url: &str) -> PathBuf {
            let relative = url.strip_prefix(self.base_url.as_str()).unwrap_or(url);
            self.root.join(relative.trim_start_matches('/'))
        }
    }

    impl TextureLoader for FsTextureLoader {
        fn load(&self, path: &str) -> TextureHandle {
            let handle = TextureHandle::pending(path);
            let file = self.resolve(path);
            let result = std::fs::read(&file)
                .with_context(|| format!("unable to read {}", file.display()))
                .and_then(|bytes| decode_image(&bytes));
            match result {
                Ok(image) => handle.fulfill(image),
                Err(err) => handle.fail(format!("{err:#}")),
            }
            handle
        }
    }
}
