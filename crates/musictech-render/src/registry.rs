//! Engine registry
//!
//! Holds one instance of every engine. Only the active engine receives
//! spectra and frames; the others keep their animation state untouched
//! until they are selected again.

use crate::engine::{FrameInfo, Visualizer};
use crate::engines::{
    FractalLayersEngine, KaleidoscopeEngine, MandelbrotEngine, SpectrumBarsEngine,
};
use crate::{RenderError, Result};
use musictech_core::{Canvas, MagnitudeSpectrum, VisualizerConfig};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Available visualizers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineKind {
    /// Radial spectrum with beat-driven particles
    #[default]
    Kaleidoscope,
    /// Mirrored spring-damped bars
    SpectrumBars,
    /// Layered pseudo-3D fractals
    FractalLayers,
    /// Escape-time fractal
    Mandelbrot,
}

impl EngineKind {
    /// List all engines in display order
    pub fn all() -> &'static [EngineKind] {
        &[
            EngineKind::Kaleidoscope,
            EngineKind::SpectrumBars,
            EngineKind::FractalLayers,
            EngineKind::Mandelbrot,
        ]
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Kaleidoscope => "Kaleidoscope",
            EngineKind::SpectrumBars => "Spectrum Bars",
            EngineKind::FractalLayers => "Fractal Layers",
            EngineKind::Mandelbrot => "Mandelbrot",
        }
    }

    /// Identifier used in configuration files and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            EngineKind::Kaleidoscope => "kaleidoscope",
            EngineKind::SpectrumBars => "spectrum-bars",
            EngineKind::FractalLayers => "fractal-layers",
            EngineKind::Mandelbrot => "mandelbrot",
        }
    }

    /// The engine after this one, wrapping around
    pub fn next(self) -> Self {
        let all = Self::all();
        all[(self.index() + 1) % all.len()]
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = RenderError;

    /// Accepts the identifier or the display name, ignoring case
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.id().eq_ignore_ascii_case(s) || kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| RenderError::UnknownEngine(s.to_string()))
    }
}

/// Owns every engine and routes frames to the selected one
pub struct VisualizerRegistry {
    engines: Vec<Box<dyn Visualizer>>,
    active: EngineKind,
    magnitudes: Arc<MagnitudeSpectrum>,
    playing: bool,
    frame_index: u64,
}

impl VisualizerRegistry {
    /// Build all engines from `config`, with the kaleidoscope selected
    pub fn new(config: &VisualizerConfig) -> Result<Self> {
        config.validate()?;

        // Same order as EngineKind::all()
        let engines: Vec<Box<dyn Visualizer>> = vec![
            Box::new(KaleidoscopeEngine::new(config)?),
            Box::new(SpectrumBarsEngine::new()),
            Box::new(FractalLayersEngine::new()),
            Box::new(MandelbrotEngine::new(config)?),
        ];
        debug!("VisualizerRegistry created with {} engines", engines.len());

        Ok(Self {
            engines,
            active: EngineKind::default(),
            magnitudes: Arc::new(MagnitudeSpectrum::silent(0)),
            playing: false,
            frame_index: 0,
        })
    }

    /// Switch the active engine. Other engines are not touched.
    pub fn select(&mut self, kind: EngineKind) {
        if kind != self.active {
            debug!("Visualizer switched: {} -> {}", self.active, kind);
            self.active = kind;
        }
    }

    /// Switch by identifier or display name
    pub fn select_by_name(&mut self, name: &str) -> Result<EngineKind> {
        let kind = name.parse()?;
        self.select(kind);
        Ok(kind)
    }

    /// Currently selected engine
    pub fn active_kind(&self) -> EngineKind {
        self.active
    }

    /// The engine for `kind`
    pub fn engine(&self, kind: EngineKind) -> &dyn Visualizer {
        self.engines[kind.index()].as_ref()
    }

    /// Mutable access to the engine for `kind`
    pub fn engine_mut(&mut self, kind: EngineKind) -> &mut dyn Visualizer {
        self.engines[kind.index()].as_mut()
    }

    /// Latest spectrum, forwarded to the active engine on the next render
    pub fn set_magnitudes(&mut self, magnitudes: Arc<MagnitudeSpectrum>) {
        self.magnitudes = magnitudes;
    }

    /// Playback flag, forwarded to the active engine on the next render
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Whether playback is flagged as running
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Frames rendered so far, across all engines
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Render one frame at the reference frame step
    pub fn render(&mut self, canvas: &mut dyn Canvas, width: f32, height: f32) {
        let frame = FrameInfo::new(width, height);
        self.render_frame(canvas, &frame);
    }

    /// Render one frame with explicit timing
    pub fn render_frame(&mut self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let frame = frame.with_index(self.frame_index);
        let engine = self.engines[self.active.index()].as_mut();
        engine.set_playing(self.playing);
        engine.set_magnitudes(Arc::clone(&self.magnitudes));
        engine.render(canvas, &frame);
        self.frame_index += 1;
    }
}
