use glam::Vec3;

use crate::assets::{CubeTexture, TextureHandle, TextureLoader};
use crate::config::{AppConfig, LightingConfig, PlanetConfig};

/// The whole scene graph. Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Scene {
    pub background: CubeTexture,
    pub lights: Vec<Light>,
    pub bodies: Vec<Body>,
}

impl Scene {
    pub fn body(&self, name: &str) -> Option<&Body> {
        self.bodies.iter().find(|body| body.name == name)
    }

    pub fn labels(&self) -> impl Iterator<Item = (&Body, &Label)> {
        self.bodies
            .iter()
            .filter_map(|body| body.label.as_ref().map(|label| (body, label)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    /// Receives ambient and point light.
    Lit,
    /// Emits its own color; ignores lights.
    Unlit,
}

/// A sphere in the scene (the sun or a planet).
#[derive(Debug, Clone)]
pub struct Body {
    pub name: String,
    pub radius: f32,
    pub position: Vec3,
    pub color: Vec3,
    pub texture: Option<TextureHandle>,
    pub shading: Shading,
    /// Child label; lives and dies with the body.
    pub label: Option<Label>,
}

impl Body {
    /// World-space anchor of the label, if the body has one.
    pub fn label_anchor(&self) -> Option<Vec3> {
        self.label.as_ref().map(|label| self.position + label.offset)
    }
}

/// Screen-space text attached above a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    /// Position relative to the owning body.
    pub offset: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient { color: Vec3, intensity: f32 },
    Point { color: Vec3, intensity: f32, position: Vec3 },
}

/// Background cube map read from `<base>{px,nx,py,ny,pz,nz}.jpg`.
pub fn environment_map(base: &str, loader: &dyn TextureLoader) -> CubeTexture {
    CubeTexture::load(base, loader)
}

/// Low ambient fill plus a point light sitting inside the sun.
pub fn lights(config: &LightingConfig) -> [Light; 2] {
    [
        Light::Ambient {
            color: config.ambient_color,
            intensity: config.ambient_intensity,
        },
        Light::Point {
            color: config.point_color,
            intensity: config.point_intensity,
            position: Vec3::ZERO,
        },
    ]
}

/// Builds a textured, lit planet with its label floating `label_gap` above the surface.
pub fn build_body(planet: &PlanetConfig, texture: TextureHandle, label_gap: f32) -> Body {
    // `AppConfig::validate` rejects these before a scene is assembled
    debug_assert!(planet.radius > 0.0, "{} has non-positive radius", planet.name);
    Body {
        name: planet.name.clone(),
        radius: planet.radius,
        position: planet.position,
        color: Vec3::ONE,
        texture: Some(texture),
        shading: Shading::Lit,
        label: Some(Label {
            text: planet.name.clone(),
            offset: Vec3::new(0.0, planet.radius + label_gap, 0.0),
        }),
    }
}

/// Assembles the sun, the configured planets, lights and background.
///
/// Texture loads are only started here; a missing file never fails assembly.
pub fn assemble(config: &AppConfig, loader: &dyn TextureLoader) -> Scene {
    let background = environment_map(&config.environment_url(), loader);

    let mut bodies = Vec::with_capacity(config.planets.len() + 1);
    bodies.push(Body {
        name: "Sun".to_string(),
        radius: config.sun.radius,
        position: Vec3::ZERO,
        color: config.sun.color,
        texture: None,
        shading: Shading::Unlit,
        label: None,
    });
    for planet in &config.planets {
        let texture = loader.load(&config.asset_url(&planet.texture));
        bodies.push(build_body(planet, texture, config.label_offset));
    }

    log::info!(
        "assembled scene with {} bodies ({} labelled)",
        bodies.len(),
        bodies.iter().filter(|body| body.label.is_some()).count()
    );

    Scene {
        background,
        lights: lights(&config.lights).to_vec(),
        bodies,
    }
}
