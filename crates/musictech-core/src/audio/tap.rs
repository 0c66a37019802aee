//! Pass-through sample tap between playback and the output device.
//!
//! The tap is itself a [`SampleSource`]: reads are forwarded unchanged to the
//! wrapped source, and every sample that was actually produced is copied into
//! the analyzer on the way through.

use super::analyzer::SpectralAnalyzer;
use tracing::debug;

/// Default sample rate assumed by sources that do not report one
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Pull-based mono sample producer
pub trait SampleSource: Send {
    /// Fill `buffer[offset .. offset + count]` and return how many samples
    /// were written. Zero means "nothing available right now", not an error.
    fn read(&mut self, buffer: &mut [f32], offset: usize, count: usize) -> usize;

    /// Samples per second
    fn sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read(&mut self, buffer: &mut [f32], offset: usize, count: usize) -> usize {
        (**self).read(buffer, offset, count)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }
}

/// Decorator feeding every read sample to a [`SpectralAnalyzer`]
pub struct SampleTap<S> {
    source: S,
    analyzer: SpectralAnalyzer,
    gaps: u64,
}

impl<S: SampleSource> SampleTap<S> {
    /// Wrap `source`, feeding `analyzer`
    pub fn new(source: S, analyzer: SpectralAnalyzer) -> Self {
        Self {
            source,
            analyzer,
            gaps: 0,
        }
    }

    /// The analyzer fed by this tap
    pub fn analyzer(&self) -> &SpectralAnalyzer {
        &self.analyzer
    }

    /// Mutable access to the analyzer
    pub fn analyzer_mut(&mut self) -> &mut SpectralAnalyzer {
        &mut self.analyzer
    }

    /// The wrapped source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Swap in a new source. The analyzer's partial frame belongs to the old
    /// source and is discarded; the published spectrum is kept.
    pub fn replace_source(&mut self, source: S) -> S {
        self.analyzer.reset();
        debug!(
            "SampleTap source replaced ({} Hz)",
            source.sample_rate()
        );
        std::mem::replace(&mut self.source, source)
    }

    /// Number of reads that produced no samples
    pub fn gaps(&self) -> u64 {
        self.gaps
    }

    /// Unwrap into the source and analyzer
    pub fn into_inner(self) -> (S, SpectralAnalyzer) {
        (self.source, self.analyzer)
    }
}

impl<S: SampleSource> SampleSource for SampleTap<S> {
    fn read(&mut self, buffer: &mut [f32], offset: usize, count: usize) -> usize {
        let read = self.source.read(buffer, offset, count);
        if read == 0 {
            self.gaps += 1;
            return 0;
        }

        // A misbehaving source must not push us past the caller's buffer
        let end = (offset + read).min(buffer.len());
        if offset < end {
            self.analyzer.add_samples(&buffer[offset..end]);
        }
        read
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }
}

/// In-memory source that plays a fixed sample buffer once
#[derive(Debug, Clone)]
pub struct BufferSource {
    samples: Vec<f32>,
    position: usize,
    sample_rate: u32,
}

impl BufferSource {
    /// Play `samples` at the default rate
    pub fn new(samples: Vec<f32>) -> Self {
        Self::with_sample_rate(samples, DEFAULT_SAMPLE_RATE)
    }

    /// Play `samples` at `sample_rate`
    pub fn with_sample_rate(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
        }
    }

    /// Samples not yet read
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl SampleSource for BufferSource {
    fn read(&mut self, buffer: &mut [f32], offset: usize, count: usize) -> usize {
        let offset = offset.min(buffer.len());
        let available = buffer.len() - offset;
        let n = count.min(available).min(self.remaining());
        buffer[offset..offset + n]
            .copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        n
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
