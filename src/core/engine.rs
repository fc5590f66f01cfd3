//! Media engine collaborator surface.
//!
//! The engine itself (decoding, demuxing, transcoding) lives outside this
//! crate; sessions talk to it through [`MediaEngine`]. The trait covers the
//! per-session working storage the engine exposes plus the three commands the
//! load pipeline issues: probe, extract, transcode.
//!
//! [`EngineService`] holds the process-wide shared instance: created on first
//! use, returned unchanged thereafter, never torn down until process exit.
//! Sessions hold a reference, not ownership.

use once_cell::sync::OnceCell;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::events::NotificationHub;

/// Engine operation failures
#[derive(Debug)]
pub enum EngineError {
    /// Path does not exist in the engine's storage
    NotFound(String),
    /// Directory already present (create_dir only)
    AlreadyExists(String),
    /// Storage read/write failure
    Io(String),
    /// A command (probe/extract/transcode) failed
    Failed(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(p) => write!(f, "Not found: {}", p),
            EngineError::AlreadyExists(p) => write!(f, "Already exists: {}", p),
            EngineError::Io(e) => write!(f, "Storage error: {}", e),
            EngineError::Failed(e) => write!(f, "Engine command failed: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

/// Probe command: inspect `input` and write a JSON sidecar describing its
/// video streams to `sidecar` (no frame decoding).
#[derive(Debug, Clone)]
pub struct ProbeSpec {
    pub input: PathBuf,
    pub sidecar: PathBuf,
}

/// Extract command: decode `input` into numbered still images.
///
/// `pattern` carries a `%04d` placeholder the engine substitutes with the
/// 1-based frame number (e.g. `<dir>/frame_%04d.png`).
#[derive(Debug, Clone)]
pub struct ExtractSpec {
    pub input: PathBuf,
    pub pattern: PathBuf,
    /// Scale frames to this width, preserving aspect (None = native)
    pub scale_width: Option<u32>,
}

/// Trim bounds for a transcode, as timecode strings (`"00:00:01.5"` or
/// plain seconds), start + duration.
#[derive(Debug, Clone)]
pub struct TrimBounds {
    pub start: String,
    pub duration: String,
}

/// Transcode command: write a single edited copy of `input` to `output`.
///
/// The concrete codec arguments (faststart, all-intra, pixel format) are
/// owned by the engine implementation.
#[derive(Debug, Clone)]
pub struct TranscodeSpec {
    pub input: PathBuf,
    pub output: PathBuf,
    pub trim: Option<TrimBounds>,
    pub optimize: bool,
}

/// External media engine: working storage plus probe/extract/transcode.
///
/// Storage paths are relative to the engine's storage root; sessions only
/// ever pass paths underneath their own working directory. Implementations
/// report progress/log lines through [`notifications`](Self::notifications).
pub trait MediaEngine: Send + Sync {
    /// Create a directory. Implementations may report an existing directory
    /// as [`EngineError::AlreadyExists`]; callers treat that as success.
    fn create_dir(&self, dir: &Path) -> Result<(), EngineError>;

    /// Write `bytes` to `path`, replacing any previous content.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), EngineError>;

    /// Read the full content of `path`.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, EngineError>;

    /// List the file names (not paths) directly under `dir`.
    fn list_dir(&self, dir: &Path) -> Result<Vec<String>, EngineError>;

    /// Remove `dir` and everything under it. Removing an absent directory
    /// is [`EngineError::NotFound`]; cleanup paths treat that as success.
    fn remove_dir_all(&self, dir: &Path) -> Result<(), EngineError>;

    /// Inspect a media file and write the metadata sidecar.
    fn probe(&self, spec: &ProbeSpec) -> Result<(), EngineError>;

    /// Decode a media file into numbered frame images.
    fn extract(&self, spec: &ExtractSpec) -> Result<(), EngineError>;

    /// Re-encode a media file into a single output file.
    fn transcode(&self, spec: &TranscodeSpec) -> Result<(), EngineError>;

    /// The hub this engine delivers progress/log notices through.
    fn notifications(&self) -> &NotificationHub;
}

static SHARED_ENGINE: OnceCell<Arc<dyn MediaEngine>> = OnceCell::new();

/// Process-wide engine holder.
///
/// The instance is created by the first `acquire_with` call and reused by
/// every later one; the factory passed by later callers is never invoked.
/// There is deliberately no release: the engine lives until process exit.
pub struct EngineService;

impl EngineService {
    /// Get the shared engine, creating it on first use via `factory`.
    pub fn acquire_with<F>(factory: F) -> anyhow::Result<Arc<dyn MediaEngine>>
    where
        F: FnOnce() -> anyhow::Result<Arc<dyn MediaEngine>>,
    {
        SHARED_ENGINE.get_or_try_init(factory).cloned()
    }

    /// The shared engine, if one has been created.
    pub fn get() -> Option<Arc<dyn MediaEngine>> {
        SHARED_ENGINE.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullEngine {
        hub: NotificationHub,
    }

    impl NullEngine {
        fn new() -> Self {
            Self {
                hub: NotificationHub::new(),
            }
        }
    }

    impl MediaEngine for NullEngine {
        fn create_dir(&self, _dir: &Path) -> Result<(), EngineError> {
            Ok(())
        }
        fn write_file(&self, _path: &Path, _bytes: &[u8]) -> Result<(), EngineError> {
            Ok(())
        }
        fn read_file(&self, path: &Path) -> Result<Vec<u8>, EngineError> {
            Err(EngineError::NotFound(path.display().to_string()))
        }
        fn list_dir(&self, _dir: &Path) -> Result<Vec<String>, EngineError> {
            Ok(Vec::new())
        }
        fn remove_dir_all(&self, path: &Path) -> Result<(), EngineError> {
            Err(EngineError::NotFound(path.display().to_string()))
        }
        fn probe(&self, _spec: &ProbeSpec) -> Result<(), EngineError> {
            Ok(())
        }
        fn extract(&self, _spec: &ExtractSpec) -> Result<(), EngineError> {
            Ok(())
        }
        fn transcode(&self, _spec: &TranscodeSpec) -> Result<(), EngineError> {
            Ok(())
        }
        fn notifications(&self) -> &NotificationHub {
            &self.hub
        }
    }

    #[test]
    fn test_service_returns_same_instance() {
        let first = EngineService::acquire_with(|| Ok(Arc::new(NullEngine::new()) as _)).unwrap();
        let second =
            EngineService::acquire_with(|| panic!("factory must not run again")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(EngineService::get().is_some());
    }

    #[test]
    fn test_error_display() {
        let e = EngineError::NotFound("abc/input.mp4".into());
        assert_eq!(e.to_string(), "Not found: abc/input.mp4");

        let e = EngineError::Failed("exit code 1".into());
        assert_eq!(e.to_string(), "Engine command failed: exit code 1");
    }
}
