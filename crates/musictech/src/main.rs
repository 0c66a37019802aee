//! MusicTech - headless audio visualizer host
//!
//! Runs a synthetic track through the analyzer on an audio thread and
//! renders the selected visualizer into an off-screen surface at a fixed
//! frame rate.

#![warn(missing_docs)]

mod audio_thread;
mod config;
mod logging_setup;
mod playback;
mod tone;

use crate::audio_thread::{AudioCommand, AudioPacing, AudioThread};
use crate::config::HostConfig;
use crate::playback::PlaybackState;
use crate::tone::ToneSource;
use anyhow::{Context, Result};
use musictech_core::audio::tap::DEFAULT_SAMPLE_RATE;
use musictech_core::{FrameClock, SampleSource, SpectralAnalyzer};
use musictech_render::{FrameInfo, PixmapCanvas, VisualizerRegistry};
use std::sync::Arc;
use tracing::{debug, info};

fn main() -> Result<()> {
    let config = HostConfig::load()?;
    let _log_guard = logging_setup::init(&config)?;

    info!("==========================================");
    info!("===      MusicTech Session Started     ===");
    info!("==========================================");

    run(&config)
}

fn run(config: &HostConfig) -> Result<()> {
    let session = &config.session;
    let (width, height) = (session.width, session.height);

    let (analyzer, reader) = SpectralAnalyzer::new(config.visualizer.analyzer.clone())
        .context("Failed to create spectral analyzer")?;
    let mut playlist = session.playlist.iter().enumerate();
    let (_, first) = playlist.next().context("Playlist is empty")?;
    let tone = ToneSource::from_settings(first, DEFAULT_SAMPLE_RATE);
    let playback = Arc::new(PlaybackState::new(tone.sample_rate(), first.duration()));

    let mut registry =
        VisualizerRegistry::new(&config.visualizer).context("Failed to create visualizers")?;
    registry.select_by_name(&session.engine)?;
    let mut canvas = PixmapCanvas::new(width, height)?;
    let mut clock = FrameClock::from_config(&config.visualizer.frame)?;

    let audio = AudioThread::spawn(
        analyzer,
        Box::new(tone),
        Arc::clone(&playback),
        AudioPacing {
            block_size: session.block_size,
            realtime: true,
        },
    )?;

    let fps = config.visualizer.frame.target_fps;
    let total_frames = (session.duration_secs * fps).ceil() as u64;
    let cycle_frames = (session.cycle_secs * fps).round() as u64;
    let pause_frame = session.pause_at_secs.map(|s| (s * fps).round() as u64);
    let resume_frame = session.resume_at_secs.map(|s| (s * fps).round() as u64);
    info!(
        "Rendering {} frames at {}x{} starting with {}",
        total_frames,
        width,
        height,
        registry.active_kind()
    );

    let mut last_sequence = 0;
    let mut stale_frames = 0u64;
    let mut playlist_done = false;
    while clock.frames() < total_frames {
        let tick = clock.wait_next();

        if pause_frame == Some(tick.index) {
            info!("Pausing playback at {:?}", playback.elapsed());
            audio.send(AudioCommand::Pause)?;
        }
        if resume_frame == Some(tick.index) {
            info!("Resuming playback at {:?}", playback.elapsed());
            audio.send(AudioCommand::Resume)?;
        }
        if !playlist_done && playback.progress() == Some(1.0) {
            match playlist.next() {
                Some((index, next)) => {
                    info!("Starting track {}", index + 1);
                    playback.rewind();
                    playback.set_total(next.duration());
                    let tone = ToneSource::from_settings(next, DEFAULT_SAMPLE_RATE);
                    audio.send(AudioCommand::SwitchSource(Box::new(tone)))?;
                }
                None => {
                    info!("Playlist finished");
                    audio.send(AudioCommand::Pause)?;
                    playlist_done = true;
                }
            }
        }
        if cycle_frames > 0 && tick.index % cycle_frames == 0 {
            registry.select(registry.active_kind().next());
        }

        let spectrum = reader.latest();
        if spectrum.sequence() == last_sequence {
            stale_frames += 1;
        }
        last_sequence = spectrum.sequence();

        registry.set_magnitudes(spectrum);
        registry.set_playing(playback.is_playing());
        let frame = FrameInfo::new(width as f32, height as f32).with_dt(tick.dt);
        registry.render_frame(&mut canvas, &frame);

        if tick.index % 300 == 0 {
            debug!(
                "Frame {}: position {:?} ({:?}), {} skipped, {} without a new spectrum",
                tick.index,
                playback.elapsed(),
                playback.progress(),
                clock.skipped_total(),
                stale_frames
            );
        }
    }

    let stats = audio.stop()?;
    info!(
        "Session finished: {} frames ({} skipped), {} spectra from {} samples, {} gaps",
        clock.frames(),
        clock.skipped_total(),
        stats.frames_analyzed,
        stats.samples,
        stats.gaps
    );

    if let Some(path) = &session.snapshot_path {
        canvas
            .pixmap()
            .save_png(path)
            .with_context(|| format!("Failed to write snapshot: {:?}", path))?;
        info!("Snapshot written to {:?}", path);
    }

    Ok(())
}
