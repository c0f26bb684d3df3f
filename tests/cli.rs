use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::io::Write;
use std::process::Command;
use tempfile::{tempdir, NamedTempFile};

fn solar_scene() -> Command {
    let mut cmd = Command::cargo_bin("solar-scene").expect("binary exists");
    cmd.env_remove("SOLAR_BASE_URL");
    cmd
}

#[test]
fn cli_prints_scene_summary_with_missing_textures() {
    let assets = tempdir().expect("temp dir");
    let mut cmd = solar_scene();
    cmd.arg("--assets")
        .arg(assets.path())
        .arg("--base-url")
        .arg("/solar/");
    cmd.assert()
        .success()
        .stdout(contains("Assembled scene with 5 bodies (2 lights)"))
        .stdout(contains(" - Sun radius=5.00 pos=(0.00, 0.00, 0.00) unlit"))
        .stdout(contains(
            " - Earth radius=1.00 pos=(20.00, 0.00, 0.00) label=(0.00, 1.50, 0.00) texture=/solar/textures/earth.jpg [failed]",
        ))
        .stdout(contains("Background: /solar/textures/environment/ (0/6 faces ready)"))
        .stdout(contains(" - ambient color=(1.00, 1.00, 1.00) intensity=0.20"))
        .stdout(contains(" - point color=(1.00, 1.00, 1.00) intensity=1.00 pos=(0.00, 0.00, 0.00)"))
        .stdout(contains("Bloom: strength=1.50 radius=0.40 threshold=0.85"));
}

#[test]
fn cli_reports_textures_found_under_assets_dir() {
    let assets = tempdir().expect("temp dir");
    let textures = assets.path().join("textures");
    fs::create_dir_all(&textures).expect("textures dir");
    image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 255, 255]))
        .save_with_format(textures.join("earth.jpg"), image::ImageFormat::Png)
        .expect("write texture");

    let mut cmd = solar_scene();
    cmd.arg("--assets").arg(assets.path()).arg("--base-url").arg("/");
    cmd.assert()
        .success()
        .stdout(contains("texture=/textures/earth.jpg [ready]"))
        .stdout(contains("texture=/textures/mars.jpg [failed]"));
}

#[test]
fn cli_reads_config_file() {
    let mut config = NamedTempFile::new().expect("temp config");
    write!(
        config,
        r#"{{
  "base_url": "/demo/",
  "bloom": {{ "strength": 2.0 }},
  "planets": [
    {{ "name": "Pluto", "radius": 0.2, "texture": "textures/pluto.jpg", "position": [40.0, 0.0, 0.0] }}
  ]
}}"#
    )
    .expect("write config");
    let assets = tempdir().expect("temp dir");

    let mut cmd = solar_scene();
    cmd.arg("--config")
        .arg(config.path())
        .arg("--assets")
        .arg(assets.path());
    cmd.assert()
        .success()
        .stdout(contains("Assembled scene with 2 bodies (2 lights)"))
        .stdout(contains(" - Pluto radius=0.20 pos=(40.00, 0.00, 0.00) label=(0.00, 0.70, 0.00)"))
        .stdout(contains("texture=/demo/textures/pluto.jpg"))
        .stdout(contains("Bloom: strength=2.00 radius=0.40 threshold=0.85"));
}

#[test]
fn base_url_flag_overrides_environment() {
    let assets = tempdir().expect("temp dir");
    let mut cmd = solar_scene();
    cmd.env("SOLAR_BASE_URL", "/from-env/")
        .arg("--assets")
        .arg(assets.path());
    cmd.assert()
        .success()
        .stdout(contains("texture=/from-env/textures/venus.jpg"));

    let mut cmd = solar_scene();
    cmd.env("SOLAR_BASE_URL", "/from-env/")
        .arg("--assets")
        .arg(assets.path())
        .arg("--base-url")
        .arg("/from-flag/");
    cmd.assert()
        .success()
        .stdout(contains("texture=/from-flag/textures/venus.jpg"));
}

#[test]
fn cli_rejects_unknown_arguments() {
    let mut cmd = solar_scene();
    cmd.arg("--fast");
    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("Error: Unknown argument: --fast"));
}

#[test]
fn cli_rejects_malformed_config() {
    let mut config = NamedTempFile::new().expect("temp config");
    config.write_all(b"{ not json").expect("write config");

    let mut cmd = solar_scene();
    cmd.arg("--config").arg(config.path());
    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("invalid configuration JSON"));
}

#[test]
fn cli_rejects_non_positive_radius() {
    let mut config = NamedTempFile::new().expect("temp config");
    write!(
        config,
        r#"{{ "planets": [{{ "name": "Ghost", "radius": 0.0, "texture": "g.jpg", "position": [5.0, 0.0, 0.0] }}] }}"#
    )
    .expect("write config");

    let mut cmd = solar_scene();
    cmd.arg("--config").arg(config.path());
    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("planet `Ghost` radius must be positive, got 0"));
}
