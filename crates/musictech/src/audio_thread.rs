//! Audio-producer thread
//!
//! Pulls blocks from the current source through a [`SampleTap`], paced to
//! real time. Control messages arrive on a bounded channel and are polled
//! between blocks, so the loop never waits on the render thread.

use crate::playback::PlaybackState;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Sender, TryRecvError, TrySendError};
use musictech_core::{SampleSource, SampleTap, SpectralAnalyzer};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const COMMAND_CAPACITY: usize = 16;

/// Source handled by the audio thread
pub type BoxedSource = Box<dyn SampleSource>;

/// Messages from the host to the audio thread
pub enum AudioCommand {
    /// Replace the source; the analyzer's partial frame is discarded
    SwitchSource(BoxedSource),
    /// Stop pulling samples
    Pause,
    /// Resume pulling samples
    Resume,
    /// Leave the loop
    Stop,
}

/// Counters reported when the thread exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioStats {
    /// Samples pulled from sources
    pub samples: u64,
    /// Spectra published
    pub frames_analyzed: u64,
    /// Reads that returned nothing
    pub gaps: u64,
}

/// Handle to the running audio thread
pub struct AudioThread {
    commands: Sender<AudioCommand>,
    handle: JoinHandle<AudioStats>,
}

/// How the loop paces itself
#[derive(Debug, Clone, Copy)]
pub struct AudioPacing {
    /// Samples per read
    pub block_size: usize,
    /// Sleep for the duration of each block
    pub realtime: bool,
}

impl AudioThread {
    /// Start pulling from `source` into `analyzer`
    pub fn spawn(
        analyzer: SpectralAnalyzer,
        source: BoxedSource,
        playback: Arc<PlaybackState>,
        pacing: AudioPacing,
    ) -> Result<Self> {
        let (commands, receiver) = bounded(COMMAND_CAPACITY);
        let block_size = pacing.block_size.max(1);

        let handle = thread::Builder::new()
            .name("musictech-audio".to_string())
            .spawn(move || {
                let mut tap = SampleTap::new(source, analyzer);
                let mut buffer = vec![0.0f32; block_size];
                let mut samples = 0u64;
                playback.set_playing(true);
                debug!("Audio thread started: {} samples per block", block_size);

                'run: loop {
                    loop {
                        match receiver.try_recv() {
                            Ok(AudioCommand::SwitchSource(next)) => {
                                tap.replace_source(next);
                                playback.rewind();
                                debug!("Audio source switched");
                            }
                            Ok(AudioCommand::Pause) => playback.set_playing(false),
                            Ok(AudioCommand::Resume) => playback.set_playing(true),
                            Ok(AudioCommand::Stop) | Err(TryRecvError::Disconnected) => {
                                break 'run
                            }
                            Err(TryRecvError::Empty) => break,
                        }
                    }

                    let block_time = block_duration(block_size, tap.sample_rate());
                    if !playback.is_playing() {
                        thread::sleep(block_time);
                        continue;
                    }

                    let read = tap.read(&mut buffer, 0, block_size);
                    if read == 0 {
                        trace!("Audio source idle");
                        thread::sleep(block_time);
                        continue;
                    }
                    samples += read as u64;
                    playback.advance(read);

                    if pacing.realtime {
                        thread::sleep(block_duration(read, tap.sample_rate()));
                    }
                }

                playback.set_playing(false);
                let stats = AudioStats {
                    samples,
                    frames_analyzed: tap.analyzer().frames_analyzed(),
                    gaps: tap.gaps(),
                };
                debug!("Audio thread finished: {:?}", stats);
                stats
            })
            .context("Failed to spawn audio thread")?;

        info!("Audio thread running");
        Ok(Self { commands, handle })
    }

    /// Queue a command without blocking. A full queue drops the command.
    pub fn send(&self, command: AudioCommand) -> Result<()> {
        match self.commands.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("Audio command queue full, command dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("Audio thread has exited")),
        }
    }

    /// Stop the thread and collect its counters
    pub fn stop(self) -> Result<AudioStats> {
        // Ignored: the thread may already have exited
        let _ = self.commands.send(AudioCommand::Stop);
        self.handle
            .join()
            .map_err(|_| anyhow!("Audio thread panicked"))
    }
}

fn block_duration(samples: usize, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(samples as f64 / f64::from(sample_rate.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::ToneSource;
    use musictech_core::AnalyzerConfig;
    use std::time::Instant;

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_thread_publishes_spectra() {
        let (analyzer, reader) = SpectralAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let playback = Arc::new(PlaybackState::new(44_100, None));
        let tone = ToneSource::new(44_100).with_partial(440.0, 0.5);
        let pacing = AudioPacing {
            block_size: 256,
            realtime: false,
        };
        let audio = AudioThread::spawn(analyzer, Box::new(tone), playback.clone(), pacing).unwrap();

        assert!(wait_for(|| reader.sequence() >= 3));
        assert_eq!(reader.latest().len(), 512);

        let stats = audio.stop().unwrap();
        assert!(stats.frames_analyzed >= 3);
        assert!(stats.samples >= 3 * 1024);
        assert!(!playback.is_playing());
    }

    #[test]
    fn test_pause_stops_progress() {
        let (analyzer, _reader) = SpectralAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let playback = Arc::new(PlaybackState::new(44_100, None));
        let tone = ToneSource::new(44_100).with_partial(440.0, 0.5);
        let pacing = AudioPacing {
            block_size: 64,
            realtime: true,
        };
        let audio = AudioThread::spawn(analyzer, Box::new(tone), playback.clone(), pacing).unwrap();

        assert!(wait_for(|| playback.samples_played() > 0));
        audio.send(AudioCommand::Pause).unwrap();
        assert!(wait_for(|| !playback.is_playing()));

        // One block may still have been in flight when the pause landed
        thread::sleep(Duration::from_millis(20));
        let paused_at = playback.samples_played();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(playback.samples_played(), paused_at);

        audio.stop().unwrap();
    }

    #[test]
    fn test_exhausted_source_counts_gaps() {
        let (analyzer, _reader) = SpectralAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let playback = Arc::new(PlaybackState::new(1_000, None));
        let tone = ToneSource::new(1_000).with_partial(10.0, 0.5).with_duration(0.0);
        let pacing = AudioPacing {
            block_size: 16,
            realtime: false,
        };
        let audio = AudioThread::spawn(analyzer, Box::new(tone), playback, pacing).unwrap();
        thread::sleep(Duration::from_millis(60));

        let stats = audio.stop().unwrap();
        assert_eq!(stats.samples, 0);
        assert!(stats.gaps > 0);
    }
}
