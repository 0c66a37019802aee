//! Host configuration, loaded from the TOML file named by `MUSICTECH_CONFIG`

use crate::tone::ToneSettings;
use anyhow::{ensure, Context, Result};
use musictech_core::{LogConfig, VisualizerConfig};
use musictech_render::EngineKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "MUSICTECH_CONFIG";

/// What the headless session renders and for how long
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
    /// Session length in seconds
    pub duration_secs: f32,
    /// Initial engine, by identifier or display name
    pub engine: String,
    /// Switch to the next engine this often; 0 keeps one engine
    pub cycle_secs: f32,
    /// Pause playback after this many seconds
    pub pause_at_secs: Option<f32>,
    /// Resume playback after this many seconds
    pub resume_at_secs: Option<f32>,
    /// Samples per audio block
    pub block_size: usize,
    /// Write the last frame here as PNG
    pub snapshot_path: Option<PathBuf>,
    /// Test signals played in order; each one ends after its duration
    pub playlist: Vec<ToneSettings>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            duration_secs: 10.0,
            engine: EngineKind::default().id().to_string(),
            cycle_secs: 0.0,
            pause_at_secs: None,
            resume_at_secs: None,
            block_size: 512,
            snapshot_path: None,
            playlist: vec![ToneSettings::default()],
        }
    }
}

/// Everything the host reads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Logging
    pub log: LogConfig,
    /// Analyzer, engines and pacing
    pub visualizer: VisualizerConfig,
    /// Session
    pub session: SessionConfig,
}

impl HostConfig {
    /// Load from `MUSICTECH_CONFIG`, or defaults when it is unset
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.visualizer.validate()?;
        let session = &self.session;
        ensure!(
            session.width > 0 && session.height > 0,
            "Surface must not be empty: {}x{}",
            session.width,
            session.height
        );
        ensure!(
            session.duration_secs.is_finite() && session.duration_secs >= 0.0,
            "Invalid session duration: {}",
            session.duration_secs
        );
        ensure!(
            session.cycle_secs.is_finite() && session.cycle_secs >= 0.0,
            "Invalid engine cycle: {}",
            session.cycle_secs
        );
        ensure!(session.block_size > 0, "Audio block size must be positive");
        ensure!(!session.playlist.is_empty(), "Playlist is empty");
        for (i, tone) in session.playlist.iter().enumerate() {
            if let Some(seconds) = tone.duration_secs {
                ensure!(
                    seconds.is_finite() && seconds >= 0.0,
                    "Invalid duration for track {}: {}",
                    i,
                    seconds
                );
            }
        }
        session.engine.parse::<EngineKind>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(HostConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HostConfig::from_toml(
            r#"
            [visualizer.beat]
            threshold = 0.8

            [session]
            engine = "Fractal Layers"
            width = 320
            height = 240

            [[session.playlist]]
            frequencies = [110.0]
            duration_secs = 2.0

            [[session.playlist]]
            bpm = 90.0
            "#,
        )
        .unwrap();

        assert_eq!(config.visualizer.beat.threshold, 0.8);
        assert_eq!(config.visualizer.beat.history, 30);
        assert_eq!(config.session.engine, "Fractal Layers");
        assert_eq!(config.session.block_size, 512);
        assert_eq!(config.session.playlist.len(), 2);
        assert_eq!(config.session.playlist[0].frequencies, vec![110.0]);
        assert_eq!(config.session.playlist[1].frequencies.len(), 3);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_rejects_unknown_engine() {
        let err = HostConfig::from_toml("[session]\nengine = \"oscilloscope\"").unwrap_err();
        assert!(format!("{:#}", err).contains("oscilloscope"));
    }

    #[test]
    fn test_rejects_negative_track_duration() {
        let text = "[[session.playlist]]\nduration_secs = -1.0";
        assert!(HostConfig::from_toml(text).is_err());
    }

    #[test]
    fn test_rejects_bad_analyzer() {
        assert!(HostConfig::from_toml("[visualizer.analyzer]\nfft_size = 1000").is_err());
    }
}
