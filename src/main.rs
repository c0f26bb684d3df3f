use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;

use solar_scene::assets::TextureState;
use solar_scene::config::BASE_URL_ENV;
use solar_scene::{scene, AppConfig, InitError, Light, Scene, Shading, UNSUPPORTED_MESSAGE};

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn run() -> Result<()> {
    use solar_scene::assets::FsTextureLoader;

    let options = CliOptions::parse(env::args().skip(1))?;
    let config = options.load_config()?;

    if options.probe_gpu {
        match pollster::block_on(solar_scene::render::probe_adapter()) {
            Some(name) => println!("GPU adapter: {name}"),
            None => {
                eprintln!("{UNSUPPORTED_MESSAGE}");
                return Err(InitError::Unsupported.into());
            }
        }
    }

    let loader = FsTextureLoader::new(&options.assets, &config.base_url);
    let scene = scene::assemble(&config, &loader);
    print_summary(&config, &scene);
    Ok(())
}

#[derive(Debug, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    base_url: Option<String>,
    assets: PathBuf,
    probe_gpu: bool,
}

const USAGE: &str =
    "Usage: solar-scene [--config FILE] [--base-url URL] [--assets DIR] [--probe-gpu]";

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            assets: PathBuf::from("."),
            ..Self::default()
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
            };
            match arg.as_str() {
                "--config" => options.config = Some(PathBuf::from(value("--config")?)),
                "--base-url" => options.base_url = Some(value("--base-url")?),
                "--assets" => options.assets = PathBuf::from(value("--assets")?),
                "--probe-gpu" => options.probe_gpu = true,
                other => return Err(anyhow!("Unknown argument: {other}. {USAGE}")),
            }
        }
        Ok(options)
    }

    /// Config file first, then the environment, then `--base-url`.
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                AppConfig::from_json(&json)?
            }
            None => AppConfig::default(),
        };
        if let Ok(base_url) = env::var(BASE_URL_ENV) {
            config = config.with_base_url(base_url);
        }
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        Ok(config)
    }
}

fn print_summary(config: &AppConfig, scene: &Scene) {
    println!(
        "Assembled scene with {} bodies ({} lights)",
        scene.bodies.len(),
        scene.lights.len()
    );
    for body in &scene.bodies {
        let mut line = format!(
            " - {} radius={:.2} pos={}",
            body.name,
            body.radius,
            fmt_vec(body.position)
        );
        if let Some(label) = &body.label {
            line.push_str(&format!(" label={}", fmt_vec(label.offset)));
        }
        match (&body.texture, body.shading) {
            (Some(texture), _) => {
                let state = texture.state();
                line.push_str(&format!(" texture={} [{}]", texture.path(), state.label()));
                if let TextureState::Failed(reason) = state {
                    log::debug!("{}: {reason}", texture.path());
                }
            }
            (None, Shading::Unlit) => line.push_str(" unlit"),
            (None, Shading::Lit) => {}
        }
        println!("{line}");
    }

    let ready = scene
        .background
        .faces
        .iter()
        .filter(|face| matches!(face.state(), TextureState::Ready(_)))
        .count();
    println!(
        "Background: {} ({ready}/6 faces ready)",
        config.environment_url()
    );

    for light in &scene.lights {
        match light {
            Light::Ambient { color, intensity } => {
                println!(" - ambient color={} intensity={intensity:.2}", fmt_vec(*color))
            }
            Light::Point {
                color,
                intensity,
                position,
            } => println!(
                " - point color={} intensity={intensity:.2} pos={}",
                fmt_vec(*color),
                fmt_vec(*position)
            ),
        }
    }

    let bloom = &config.bloom;
    println!(
        "Bloom: strength={:.2} radius={:.2} threshold={:.2}",
        bloom.strength, bloom.radius, bloom.threshold
    );
}

fn fmt_vec(value: Vec3) -> String {
    format!("({:.2}, {:.2}, {:.2})", value.x, value.y, value.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_every_flag() {
        let options = CliOptions::parse(args(&[
            "--config",
            "scene.json",
            "--base-url",
            "/solar/",
            "--assets",
            "public",
            "--probe-gpu",
        ]))
        .unwrap();
        assert_eq!(options.config, Some(PathBuf::from("scene.json")));
        assert_eq!(options.base_url.as_deref(), Some("/solar/"));
        assert_eq!(options.assets, PathBuf::from("public"));
        assert!(options.probe_gpu);
    }

    #[test]
    fn rejects_unknown_and_dangling_flags() {
        assert!(CliOptions::parse(args(&["--fast"])).is_err());
        let err = CliOptions::parse(args(&["--assets"])).unwrap_err();
        assert!(err.to_string().contains("--assets expects a value"));
    }

    #[test]
    fn formats_vectors_with_two_decimals() {
        assert_eq!(fmt_vec(Vec3::new(10.0, 1.5, -0.25)), "(10.00, 1.50, -0.25)");
    }
}
