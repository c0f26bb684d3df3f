use anyhow::{bail, Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Base URL baked in at build time, mirroring the bundler's `BASE_URL` override.
pub const BUILD_BASE_URL: Option<&str> = option_env!("SOLAR_BASE_URL");

/// Environment variable consulted by the native inspector.
pub const BASE_URL_ENV: &str = "SOLAR_BASE_URL";

/// Initialization-time configuration shared by every constructor.
///
/// There is exactly one of these per process; it replaces what would otherwise
/// be free-floating globals (base path, color management, tuning constants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub canvas_selector: String,
    /// Render into an sRGB surface so textures and colors are gamma-correct.
    pub color_management: bool,
    pub max_pixel_ratio: f64,
    /// Vertical gap between a body's surface and its label anchor.
    pub label_offset: f32,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub lights: LightingConfig,
    pub bloom: BloomConfig,
    pub sun: SunConfig,
    pub planets: Vec<PlanetConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: BUILD_BASE_URL.unwrap_or("/").to_string(),
            canvas_selector: "canvas.webgl".to_string(),
            color_management: true,
            max_pixel_ratio: 2.0,
            label_offset: 0.5,
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            lights: LightingConfig::default(),
            bloom: BloomConfig::default(),
            sun: SunConfig::default(),
            planets: default_planets(),
        }
    }
}

impl AppConfig {
    /// Parses a JSON document; missing fields fall back to the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid configuration JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects bodies that cannot be drawn: radii must be finite and positive,
    /// positions finite.
    pub fn validate(&self) -> Result<()> {
        if !(self.sun.radius.is_finite() && self.sun.radius > 0.0) {
            bail!("sun radius must be positive, got {}", self.sun.radius);
        }
        if !self.label_offset.is_finite() {
            bail!("label_offset must be finite, got {}", self.label_offset);
        }
        if !(self.max_pixel_ratio.is_finite() && self.max_pixel_ratio > 0.0) {
            bail!("max_pixel_ratio must be positive, got {}", self.max_pixel_ratio);
        }
        for planet in &self.planets {
            if !(planet.radius.is_finite() && planet.radius > 0.0) {
                bail!("planet `{}` radius must be positive, got {}", planet.name, planet.radius);
            }
            if !planet.position.is_finite() {
                bail!("planet `{}` position must be finite", planet.name);
            }
        }
        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Joins the base URL and a relative asset path with exactly one slash.
    pub fn asset_url(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if self.base_url.is_empty() {
            return relative.to_string();
        }
        format!("{}/{relative}", self.base_url.trim_end_matches('/'))
    }

    /// Directory holding the six environment cube faces.
    pub fn environment_url(&self) -> String {
        let mut url = self.asset_url("textures/environment");
        url.push('/');
        url
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 20.0, 40.0),
            target: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 6.0,
            max_distance: 400.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    pub point_color: Vec3,
    pub point_intensity: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.2,
            point_color: Vec3::ONE,
            point_intensity: 1.0,
        }
    }
}

/// Bloom pass constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            strength: 1.5,
            radius: 0.4,
            threshold: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunConfig {
    pub radius: f32,
    pub color: Vec3,
}

impl Default for SunConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            color: Vec3::new(1.0, 1.0, 0.0),
        }
    }
}

/// One entry of the static planet table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanetConfig {
    pub name: String,
    pub radius: f32,
    /// Texture path relative to the base URL.
    pub texture: String,
    pub position: Vec3,
}

impl PlanetConfig {
    fn new(name: &str, radius: f32, texture: &str, position: Vec3) -> Self {
        Self {
            name: name.to_string(),
            radius,
            texture: texture.to_string(),
            position,
        }
    }
}

pub fn default_planets() -> Vec<PlanetConfig> {
    vec![
        PlanetConfig::new("Mercury", 0.5, "textures/mercury.jpg", Vec3::new(10.0, 0.0, 0.0)),
        PlanetConfig::new("Venus", 0.9, "textures/venus.jpg", Vec3::new(15.0, 0.0, 0.0)),
        PlanetConfig::new("Earth", 1.0, "textures/earth.jpg", Vec3::new(20.0, 0.0, 0.0)),
        PlanetConfig::new("Mars", 0.7, "textures/mars.jpg", Vec3::new(25.0, 0.0, 0.0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_url_joins_with_single_slash() {
        let config = AppConfig::default().with_base_url("/solar/");
        assert_eq!(config.asset_url("textures/earth.jpg"), "/solar/textures/earth.jpg");
        assert_eq!(config.asset_url("/textures/earth.jpg"), "/solar/textures/earth.jpg");
        assert_eq!(config.environment_url(), "/solar/textures/environment/");
    }

    #[test]
    fn root_and_empty_base_urls() {
        let root = AppConfig::default().with_base_url("/");
        assert_eq!(root.asset_url("textures/mars.jpg"), "/textures/mars.jpg");
        let relative = AppConfig::default().with_base_url("");
        assert_eq!(relative.asset_url("textures/mars.jpg"), "textures/mars.jpg");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(r#"{ "base_url": "/x/", "bloom": { "strength": 2.0 } }"#)
            .unwrap();
        assert_eq!(config.base_url, "/x/");
        assert_eq!(config.bloom.strength, 2.0);
        assert_eq!(config.bloom.threshold, 0.85);
        assert_eq!(config.planets.len(), 4);
        assert_eq!(config.sun.radius, 5.0);
    }

    #[test]
    fn non_positive_radius_is_rejected() {
        for radius in ["0.0", "-1.0"] {
            let json = format!(
                r#"{{ "planets": [{{ "name": "X", "radius": {radius}, "texture": "x.jpg", "position": [1.0, 0.0, 0.0] }}] }}"#
            );
            let err = AppConfig::from_json(&json).unwrap_err();
            assert!(err.to_string().contains("planet `X` radius must be positive"));
        }
        let json = r#"{ "sun": { "radius": 0.0 } }"#;
        assert!(AppConfig::from_json(json).is_err());
    }

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(AppConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn default_planet_table_is_ordered() {
        let names: Vec<_> = default_planets().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Mercury", "Venus", "Earth", "Mars"]);
    }
}
