//! Audio analysis: the streaming FFT analyzer, the cross-thread spectrum
//! handoff and the pass-through tap that feeds the analyzer from playback.

pub mod analyzer;
pub mod spectrum;
pub mod tap;

pub use analyzer::SpectralAnalyzer;
pub use spectrum::{spectrum_channel, MagnitudeSpectrum, SpectrumPublisher, SpectrumReader};
pub use tap::{BufferSource, SampleSource, SampleTap};
