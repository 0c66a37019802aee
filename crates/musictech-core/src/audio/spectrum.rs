//! Lock-free handoff of magnitude spectra from the audio thread to the
//! render thread.
//!
//! The analyzer publishes a brand new [`MagnitudeSpectrum`] after every
//! transform and atomically swaps it into a shared slot. Readers only ever
//! see a complete snapshot: a spectrum is never mutated after publication.

use arc_swap::ArcSwap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One published magnitude spectrum (`fft_size / 2` bins, low to high)
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeSpectrum {
    bins: Vec<f32>,
    sequence: u64,
}

impl MagnitudeSpectrum {
    /// All-zero spectrum, published before the first frame completes
    pub fn silent(len: usize) -> Self {
        Self {
            bins: vec![0.0; len],
            sequence: 0,
        }
    }

    /// Wrap already computed bins
    pub fn new(bins: Vec<f32>, sequence: u64) -> Self {
        Self { bins, sequence }
    }

    /// Publication counter; 0 for the initial silent spectrum
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Bin magnitudes
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Magnitude of bin `index`, or 0.0 past the end
    pub fn get_or_zero(&self, index: usize) -> f32 {
        self.bins.get(index).copied().unwrap_or(0.0)
    }

    /// Largest bin magnitude
    pub fn peak(&self) -> f32 {
        self.bins.iter().copied().fold(0.0, f32::max)
    }

    /// Arithmetic mean of all bins
    pub fn mean(&self) -> f32 {
        if self.bins.is_empty() {
            return 0.0;
        }
        self.bins.iter().sum::<f32>() / self.bins.len() as f32
    }
}

impl Deref for MagnitudeSpectrum {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.bins
    }
}

#[derive(Debug)]
struct SpectrumSlot {
    current: ArcSwap<MagnitudeSpectrum>,
    sequence: AtomicU64,
    reset_requested: AtomicBool,
    bins: usize,
}

/// Create a connected publisher/reader pair holding `bins`-long spectra
pub fn spectrum_channel(bins: usize) -> (SpectrumPublisher, SpectrumReader) {
    let slot = Arc::new(SpectrumSlot {
        current: ArcSwap::from_pointee(MagnitudeSpectrum::silent(bins)),
        sequence: AtomicU64::new(0),
        reset_requested: AtomicBool::new(false),
        bins,
    });
    (
        SpectrumPublisher { slot: slot.clone() },
        SpectrumReader { slot },
    )
}

/// Producer side, owned by the analyzer on the audio thread
#[derive(Debug, Clone)]
pub struct SpectrumPublisher {
    slot: Arc<SpectrumSlot>,
}

impl SpectrumPublisher {
    /// Number of bins every published spectrum must have
    pub fn bins(&self) -> usize {
        self.slot.bins
    }

    /// Replace the published snapshot. Returns the new sequence number.
    pub fn publish(&self, bins: Vec<f32>) -> u64 {
        debug_assert_eq!(bins.len(), self.slot.bins);
        let sequence = self.slot.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        self.slot
            .current
            .store(Arc::new(MagnitudeSpectrum::new(bins, sequence)));
        sequence
    }

    /// Consume a pending reset request, if any
    pub fn take_reset_request(&self) -> bool {
        // Cheap relaxed check first; this runs once per sample.
        self.slot.reset_requested.load(Ordering::Relaxed)
            && self.slot.reset_requested.swap(false, Ordering::AcqRel)
    }

    /// A reader connected to the same slot
    pub fn reader(&self) -> SpectrumReader {
        SpectrumReader {
            slot: self.slot.clone(),
        }
    }
}

/// Consumer side, polled by the render thread once per frame
#[derive(Debug, Clone)]
pub struct SpectrumReader {
    slot: Arc<SpectrumSlot>,
}

impl SpectrumReader {
    /// Latest complete snapshot. Never blocks.
    pub fn latest(&self) -> Arc<MagnitudeSpectrum> {
        self.slot.current.load_full()
    }

    /// Sequence number of the latest snapshot
    pub fn sequence(&self) -> u64 {
        self.slot.current.load().sequence()
    }

    /// Whether a newer snapshot than `sequence` has been published
    pub fn has_new_since(&self, sequence: u64) -> bool {
        self.sequence() > sequence
    }

    /// Number of bins in every snapshot
    pub fn bins(&self) -> usize {
        self.slot.bins
    }

    /// Ask the analyzer to drop its partially filled frame. The published
    /// snapshot is left untouched.
    pub fn request_reset(&self) {
        self.slot.reset_requested.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_snapshot_is_silent() {
        let (_tx, rx) = spectrum_channel(8);
        let spectrum = rx.latest();
        assert_eq!(spectrum.len(), 8);
        assert_eq!(spectrum.sequence(), 0);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let (tx, rx) = spectrum_channel(4);
        let before = rx.latest();

        let seq = tx.publish(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(seq, 1);
        assert!(rx.has_new_since(0));

        // The old snapshot is never mutated in place
        assert!(before.iter().all(|&m| m == 0.0));
        assert_eq!(rx.latest().bins(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(rx.latest().peak(), 4.0);
        assert_eq!(rx.latest().mean(), 2.5);
    }

    #[test]
    fn test_reset_request_is_consumed_once() {
        let (tx, rx) = spectrum_channel(4);
        assert!(!tx.take_reset_request());
        rx.request_reset();
        assert!(tx.take_reset_request());
        assert!(!tx.take_reset_request());
    }

    #[test]
    fn test_cloned_publisher_continues_sequence() {
        let (tx, rx) = spectrum_channel(2);
        tx.publish(vec![0.0, 1.0]);
        let replacement = tx.clone();
        drop(tx);
        assert_eq!(replacement.publish(vec![1.0, 0.0]), 2);
        assert_eq!(rx.sequence(), 2);
    }
}
