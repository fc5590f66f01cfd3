//! FRAMEDECK - Frame-accurate video scrubbing core
//!
//! Session lifecycle and playback controller: a host hands in a video file,
//! an external media engine (behind [`MediaEngine`]) probes it and bursts it
//! into numbered frame images inside a per-session working directory, and the
//! controller scrubs/plays those frames onto an abstract drawing surface.

// Core engine (engine surface, events, frame store, playback)
pub mod core;

// Session modules (lifecycle, metadata, compositing)
pub mod config;
pub mod session;

// Re-export commonly used types from core
pub use core::engine::{
    EngineError, EngineService, ExtractSpec, MediaEngine, ProbeSpec, TranscodeSpec, TrimBounds,
};
pub use core::events::{EngineNotice, NotificationHub, SubscriptionToken};
pub use core::frame_store::{FrameError, FrameStore};
pub use core::player::Player;

// Re-export session types
pub use config::{EngineMode, PathConfig, Settings};
pub use session::compositor::{fit_rect, Compositor, DrawRect, DrawSurface};
pub use session::manager::{LoadOptions, Phase, SourceFile, VideoSession, ViewState};
pub use session::metadata::{StreamKind, VideoMetadata, DEFAULT_FRAME_RATE};
