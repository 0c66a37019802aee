//! MusicTech Render - Visualizer Engines and Canvas Backends
//!
//! This crate provides the rendering side of MusicTech, including:
//! - The `Visualizer` contract and the engine registry
//! - Four audio-reactive engines (kaleidoscope, spectrum bars,
//!   layered 3D fractals, escape-time fractal)
//! - A recording canvas for inspection and a tiny-skia raster canvas
//! - Shared post-process overlays

#![warn(missing_docs)]

use musictech_core::CoreError;
use thiserror::Error;

pub mod engine;
pub mod engines;
pub mod post;
pub mod raster;
pub mod recording;
pub mod registry;

pub use engine::{FrameInfo, Visualizer, FRAME_STEP, PAUSED_DECAY, PAUSED_TIME_SCALE};
pub use engines::{
    escape_time, smooth_iterations, BackgroundMode, EscapeTimeParams, FractalCamera,
    FractalLayersEngine, KaleidoscopeEngine, MandelbrotEnergies, MandelbrotEngine,
    SpectrumBarsEngine,
};
pub use raster::PixmapCanvas;
pub use recording::{DrawCommand, RecordingCanvas};
pub use registry::{EngineKind, VisualizerRegistry};

/// Rendering errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Invalid configuration passed through from the core
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// The raster surface could not be allocated
    #[error("Surface allocation failed for {width}x{height}")]
    SurfaceAllocation {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// No engine with this name
    #[error("Unknown visualizer: {0}")]
    UnknownEngine(String),
}

/// Result type for rendering operations
pub type Result<T> = std::result::Result<T, RenderError>;
