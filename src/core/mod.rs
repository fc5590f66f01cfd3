//! Core engine modules - engine surface, events, frame store, playback
//!
//! These modules form the playback core, independent of any UI layer.

pub mod engine;
pub mod events;
pub mod frame_store;
pub mod player;

// Re-exports for convenience
pub use engine::{EngineError, EngineService, MediaEngine};
pub use events::{EngineNotice, NotificationHub, SubscriptionToken};
pub use frame_store::FrameStore;
pub use player::Player;
