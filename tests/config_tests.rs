use anyhow::Result;
use specpipe_player::audio::{OutputBackend, OverflowPolicy};
use specpipe_player::Config;
use std::io::Write;

fn write_config(contents: &str) -> Result<(tempfile::TempDir, String)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("player.toml");
    let mut file = std::fs::File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok((dir, path.to_string_lossy().into_owned()))
}

const MINIMAL: &str = r#"
[service]
name = "specpipe-player"

[service.http]
bind = "127.0.0.1"
port = 3030

[nats]
url = "nats://localhost:4222"

[api]
base_url = "http://localhost:8000"
"#;

#[test]
fn test_minimal_config_uses_defaults() -> Result<()> {
    let (_dir, path) = write_config(MINIMAL)?;
    let cfg = Config::load(&path)?;

    assert_eq!(cfg.service.name, "specpipe-player");
    assert_eq!(cfg.http_addr(), "127.0.0.1:3030");
    assert!(cfg.nats.token.is_none());
    assert_eq!(cfg.nats.connect_timeout_ms, 5000);
    assert_eq!(cfg.api.timeout_ms, 5000);

    let playback = &cfg.playback.config;
    assert_eq!(playback.batch_size, 10);
    assert_eq!(playback.samples_per_message, 8192);
    assert_eq!(playback.messages_per_frame, 10);
    assert_eq!(playback.poll_interval_ms, 200);
    assert_eq!(playback.output_sample_rate, 32000);
    assert_eq!(playback.overflow_policy, OverflowPolicy::Split);
    assert_eq!(cfg.playback.output, OutputBackend::Clocked);
    Ok(())
}

#[test]
fn test_playback_section_overrides() -> Result<()> {
    let contents = format!(
        "{}\n[playback]\nbatch_size = 4\nsamples_per_message = 4096\noverflow_policy = \"reject\"\nfollow_device_rate = false\noutput = \"cpal\"\n",
        MINIMAL
    );
    let (_dir, path) = write_config(&contents)?;
    let cfg = Config::load(&path)?;

    assert_eq!(cfg.playback.config.batch_size, 4);
    assert_eq!(cfg.playback.config.frame_capacity(), 4096 * 2 * 10);
    assert_eq!(cfg.playback.config.overflow_policy, OverflowPolicy::Reject);
    assert!(!cfg.playback.config.follow_device_rate);
    assert_eq!(cfg.playback.output, OutputBackend::Cpal);
    Ok(())
}

#[test]
fn test_inconsistent_layout_rejected() -> Result<()> {
    let contents = format!("{}\n[playback]\nmessages_per_frame = 0\n", MINIMAL);
    let (_dir, path) = write_config(&contents)?;

    assert!(Config::load(&path).is_err());
    Ok(())
}

#[test]
fn test_missing_section_rejected() -> Result<()> {
    let (_dir, path) = write_config("[service]\nname = \"x\"\n")?;
    assert!(Config::load(&path).is_err());
    Ok(())
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    let (_dir, path) = write_config(MINIMAL)?;

    std::env::set_var("SPECPIPE__API__BASE_URL", "http://config-api:9000");
    let cfg = Config::load(&path);
    std::env::remove_var("SPECPIPE__API__BASE_URL");

    assert_eq!(cfg?.api.base_url, "http://config-api:9000");
    Ok(())
}

#[test]
fn test_shipped_config_loads() -> Result<()> {
    let cfg = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/specpipe-player"))?;
    assert_eq!(cfg.nats.namespace, "specpipe");
    Ok(())
}
