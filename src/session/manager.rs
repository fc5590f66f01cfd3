//! Session lifecycle: load pipeline, scrubbing, playback, teardown.
//!
//! A `VideoSession` isolates one loaded file in a working directory derived
//! from its time-ordered id. Loading writes the input bytes, runs the
//! engine's probe and extract/transcode concurrently (both must finish),
//! resolves metadata, fetches the numbered frames in order, and renders
//! frame 0. Teardown is idempotent and reachable from explicit disposal,
//! `Drop`, and post-error paths alike.

use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::config::{EngineMode, Settings};
use crate::core::engine::{
    EngineError, EngineService, ExtractSpec, MediaEngine, ProbeSpec, TranscodeSpec, TrimBounds,
};
use crate::core::events::{EngineNotice, SubscriptionToken};
use crate::core::frame_store::FrameStore;
use crate::core::player::Player;
use crate::session::compositor::{Compositor, DrawSurface};
use crate::session::metadata::VideoMetadata;

/// Fixed stem for the uploaded bytes inside the working directory
const INPUT_STEM: &str = "input";
/// Probe sidecar name
const SIDECAR_NAME: &str = "framerate.json";
/// Extraction pattern: 4-digit zero-padded, 1-based
const FRAME_PATTERN: &str = "frame_%04d.png";
/// Transcode output name (trim/optimize loads only)
const OUTPUT_NAME: &str = "output.mp4";

static FRAME_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^frame_\d{4}\.png$").unwrap());

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Playing,
    Error,
    Disposed,
}

/// UI-facing state holder.
///
/// The session mutates it, the presentation layer reads (or polls) it
/// through the shared handle from [`VideoSession::view`]. Controller
/// contracts are defined purely in terms of these values.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub phase: Phase,
    pub is_initialized: bool,
    pub is_loading: bool,
    /// Engine-reported progress, 0-100
    pub loading_progress: u8,
    pub current_frame: usize,
    pub total_frames: u64,
    pub frame_rate: f64,
    /// Edited copy produced by a trim/optimize load
    pub edited_media: Option<Vec<u8>>,
}

/// An uploaded file: display name plus raw bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from the host filesystem.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input.mp4")
            .to_string();

        Ok(Self { name, bytes })
    }
}

/// Per-load edit request. One shape at a time: either a trim span or the
/// optimize flag, never both.
#[derive(Debug, Clone)]
pub enum LoadOptions {
    /// Keep the span starting at `from` lasting `to` (timecode strings)
    Trim { from: String, to: String },
    /// Re-encode for fast seeking without trimming
    Optimize,
}

/// One load's worth of state: working storage, frames, playback, drawing.
pub struct VideoSession {
    id: Uuid,
    settings: Settings,
    phase: Phase,
    engine: Option<Arc<dyn MediaEngine>>,
    compositor: Option<Compositor>,
    store: FrameStore,
    player: Player,
    metadata: Option<VideoMetadata>,
    view: Arc<Mutex<ViewState>>,
    notice_token: Option<SubscriptionToken>,
}

impl std::fmt::Debug for VideoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSession")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("frames", &self.store.len())
            .finish()
    }
}

impl VideoSession {
    /// Create an unbound session with a fresh time-ordered id.
    pub fn new(settings: Settings) -> Self {
        let id = Uuid::now_v7();
        debug!("Session {} created", id);

        Self {
            id,
            player: Player::new(settings.default_frame_rate),
            store: FrameStore::new(settings.decoded_cache_frames),
            settings,
            phase: Phase::Uninitialized,
            engine: None,
            compositor: None,
            metadata: None,
            view: Arc::new(Mutex::new(ViewState::default())),
            notice_token: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Working directory inside the engine's storage, derived from the id
    /// and never reused by another session.
    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(self.id.to_string())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Shared handle to the UI-facing state holder.
    pub fn view(&self) -> Arc<Mutex<ViewState>> {
        Arc::clone(&self.view)
    }

    pub fn metadata(&self) -> Option<VideoMetadata> {
        self.metadata
    }

    pub fn frame_count(&self) -> usize {
        self.store.len()
    }

    pub fn current_frame(&self) -> usize {
        self.player.current_frame
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    /// Bind the drawing surface and acquire the media engine.
    ///
    /// A missing surface or one without a 2D context is a contract
    /// violation and fails outright. The engine comes from `engine_factory`:
    /// under [`EngineMode::Shared`] the process-wide instance is created on
    /// first use and reused by every later session; under `PerSession` the
    /// factory runs for this session alone.
    pub fn initialize<F>(
        &mut self,
        surface: Option<Arc<dyn DrawSurface>>,
        engine_factory: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<Arc<dyn MediaEngine>>,
    {
        let Some(surface) = surface else {
            bail!("Drawing surface is not bound");
        };
        self.compositor = Some(Compositor::bind(surface)?);

        let engine = match self.settings.engine_mode {
            EngineMode::Shared => EngineService::acquire_with(engine_factory)?,
            EngineMode::PerSession => engine_factory()?,
        };

        // Mirror engine progress into the view; the tag names the operation
        // loosely and is used for logging only
        let view = Arc::clone(&self.view);
        let sid = self.id.to_string();
        let token = engine.notifications().subscribe(move |notice| match notice {
            EngineNotice::Progress { tag, ratio } => {
                let pct = (ratio.clamp(0.0, 1.0) * 100.0).round() as u8;
                view.lock().expect("lock").loading_progress = pct;
                debug!("{}: engine progress {}% ({})", sid, pct, tag);
            }
            EngineNotice::Log { tag, line } => debug!("{}: engine [{}] {}", sid, tag, line),
        });

        self.notice_token = Some(token);
        self.engine = Some(engine);
        self.with_view(|v| v.is_initialized = true);
        info!(
            "Session {} initialized ({:?} engine)",
            self.id, self.settings.engine_mode
        );
        Ok(())
    }

    /// Load a file through the engine and render its first frame.
    ///
    /// Callers may invoke this speculatively: with no engine bound yet or no
    /// file supplied it is a benign no-op. Storage/engine failures are
    /// propagated and leave the session in [`Phase::Error`]; cleanup still
    /// succeeds afterwards.
    pub fn load_file(
        &mut self,
        file: Option<&SourceFile>,
        options: Option<LoadOptions>,
    ) -> Result<()> {
        let Some(engine) = self.engine.clone() else {
            debug!("Session {}: engine not ready, ignoring load", self.id);
            return Ok(());
        };
        let Some(file) = file else {
            debug!("Session {}: no file supplied, ignoring load", self.id);
            return Ok(());
        };

        self.player.stop();
        self.set_phase(Phase::Loading);
        self.with_view(|v| {
            v.is_loading = true;
            v.loading_progress = 0;
            v.edited_media = None;
        });

        let outcome = self.run_load(&engine, file, options);
        self.with_view(|v| v.is_loading = false);

        match outcome {
            Ok(()) => {
                self.set_phase(Phase::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_phase(Phase::Error);
                Err(e)
            }
        }
    }

    fn run_load(
        &mut self,
        engine: &Arc<dyn MediaEngine>,
        file: &SourceFile,
        options: Option<LoadOptions>,
    ) -> Result<()> {
        let dir = self.work_dir();

        // A leftover directory from a retried load is fine
        match engine.create_dir(&dir) {
            Ok(()) | Err(EngineError::AlreadyExists(_)) => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to create working directory {}", dir.display())
                });
            }
        }

        let input = dir.join(input_name(&file.name));
        engine
            .write_file(&input, &file.bytes)
            .with_context(|| format!("Failed to write {}", input.display()))?;
        info!(
            "Session {}: wrote {} input bytes to {}",
            self.id,
            file.bytes.len(),
            input.display()
        );

        // Probe and extract/transcode run concurrently; both must complete
        // before metadata resolution and frame enumeration proceed
        let sidecar = dir.join(SIDECAR_NAME);
        let output = dir.join(OUTPUT_NAME);
        let probe_spec = ProbeSpec {
            input: input.clone(),
            sidecar: sidecar.clone(),
        };
        let extract_spec = ExtractSpec {
            input: input.clone(),
            pattern: dir.join(FRAME_PATTERN),
            scale_width: self.settings.extract_scale_width,
        };
        let transcode_spec = options.as_ref().map(|opts| TranscodeSpec {
            input: input.clone(),
            output: output.clone(),
            trim: match opts {
                LoadOptions::Trim { from, to } => Some(TrimBounds {
                    start: from.clone(),
                    duration: to.clone(),
                }),
                LoadOptions::Optimize => None,
            },
            optimize: matches!(opts, LoadOptions::Optimize),
        });

        let (probe_res, convert_res) = rayon::join(
            || engine.probe(&probe_spec),
            || match &transcode_spec {
                Some(spec) => engine.transcode(spec),
                None => engine.extract(&extract_spec),
            },
        );
        probe_res.with_context(|| format!("Probe failed for {}", input.display()))?;
        convert_res.with_context(|| format!("Extract/transcode failed for {}", input.display()))?;

        // Metadata failures are recoverable: defaults, dimensions unresolved
        let metadata = match engine.read_file(&sidecar) {
            Ok(bytes) => VideoMetadata::resolve(&bytes, self.settings.default_frame_rate),
            Err(e) => {
                warn!(
                    "Session {}: probe sidecar unreadable ({}), falling back to defaults",
                    self.id, e
                );
                VideoMetadata::fallback(self.settings.default_frame_rate)
            }
        };
        info!(
            "Session {}: metadata {}x{} @ {} fps, {} frames reported",
            self.id, metadata.width, metadata.height, metadata.frame_rate, metadata.total_frames
        );
        self.player.set_frame_rate(metadata.frame_rate);
        self.metadata = Some(metadata);

        // Enumerate produced frames in ascending numeric order (the names
        // are zero-padded, lexical order is numeric order)
        let mut names: Vec<String> = engine
            .list_dir(&dir)
            .context("Failed to list working directory")?
            .into_iter()
            .filter(|name| FRAME_FILE.is_match(name))
            .collect();
        names.sort_unstable();

        // Fetch concurrently; the collected order is the request order,
        // never the completion order
        let payloads = names
            .par_iter()
            .map(|name| engine.read_file(&dir.join(name)))
            .collect::<Result<Vec<_>, EngineError>>()
            .context("Failed to fetch extracted frames")?;
        debug!("Session {}: fetched {} frames", self.id, payloads.len());

        self.store.replace(payloads);
        if self.settings.predecode {
            self.store
                .decode_all()
                .context("Failed to pre-decode frames")?;
        }

        // Surface the edited copy to the host (trim/optimize loads extract
        // no frames; the caller reloads the edited output to scrub it)
        if transcode_spec.is_some() {
            let edited = engine
                .read_file(&output)
                .with_context(|| format!("Failed to read {}", output.display()))?;
            self.with_view(|v| v.edited_media = Some(edited));
        }

        self.player.reset();
        let frames = self.store.len();
        self.with_view(|v| {
            v.frame_rate = metadata.frame_rate;
            v.total_frames = if frames > 0 {
                frames as u64
            } else {
                metadata.total_frames
            };
            v.current_frame = 0;
        });

        if !self.store.is_empty() {
            self.draw_frame(0)?;
        }
        Ok(())
    }

    /// Draw the frame at `index`. Out of range or while playing: silent
    /// no-op (UI gates its own controls; misuse must not crash).
    pub fn seek(&mut self, index: usize) -> Result<()> {
        if self.player.is_playing() || index >= self.store.len() {
            debug!("Session {}: seek to {} ignored", self.id, index);
            return Ok(());
        }

        self.player.current_frame = index;
        self.draw_frame(index)
    }

    /// Start timer-driven playback from the current frame.
    pub fn play(&mut self) {
        if self.store.is_empty() {
            debug!("Session {}: play with no frames ignored", self.id);
            return;
        }

        self.player.play(self.store.len());
        if self.player.is_playing() {
            self.set_phase(Phase::Playing);
        }
    }

    /// Stop playback. Idempotent.
    pub fn stop(&mut self) {
        self.player.stop();
        if self.phase == Phase::Playing {
            self.set_phase(Phase::Ready);
        }
    }

    /// Advance one frame while stopped.
    pub fn step_forward(&mut self) -> Result<()> {
        if self.player.step_forward(self.store.len()) {
            self.draw_frame(self.player.current_frame)
        } else {
            Ok(())
        }
    }

    /// Go back one frame while stopped.
    pub fn step_backward(&mut self) -> Result<()> {
        if self.player.step_backward() {
            self.draw_frame(self.player.current_frame)
        } else {
            Ok(())
        }
    }

    /// Rewind to frame 0 and redraw. Leaves the Playing/Stopped state alone.
    pub fn reset(&mut self) -> Result<()> {
        self.player.reset();
        if self.store.is_empty() {
            return Ok(());
        }
        self.draw_frame(0)
    }

    /// Pump playback from the host event loop: draws due frames and syncs
    /// the phase once the scheduler auto-stops after the final frame.
    ///
    /// Draw failures are logged, not raised; playback must survive a bad
    /// frame.
    pub fn tick(&mut self) {
        let draws = self.player.poll(self.store.len());
        for index in draws {
            if let Err(e) = self.draw_frame(index) {
                error!("Session {}: draw failed at frame {}: {:#}", self.id, index, e);
            }
        }

        if self.phase == Phase::Playing && !self.player.is_playing() {
            self.set_phase(Phase::Ready);
        }
    }

    /// Tear the session down: stop playback, drop frames, unsubscribe from
    /// engine notices, delete the working directory.
    ///
    /// Safe to call repeatedly and from every exit path; an already-removed
    /// working directory is not an error.
    pub fn cleanup(&mut self) {
        self.player.stop();
        self.player.reset();
        self.player.set_frame_rate(self.settings.default_frame_rate);
        self.store.clear();
        self.metadata = None;

        if let Some(engine) = &self.engine {
            if let Some(token) = self.notice_token.take() {
                engine.notifications().unsubscribe(token);
            }

            let dir = self.work_dir();
            match engine.remove_dir_all(&dir) {
                Ok(()) | Err(EngineError::NotFound(_)) => {}
                Err(e) => warn!(
                    "Session {}: failed to remove working directory {}: {}",
                    self.id,
                    dir.display(),
                    e
                ),
            }
        }
        self.engine = None;

        if let Some(comp) = self.compositor.as_mut() {
            comp.clear();
        }
        self.compositor = None;

        *self.view.lock().expect("lock") = ViewState {
            phase: Phase::Disposed,
            ..ViewState::default()
        };
        self.phase = Phase::Disposed;
        debug!("Session {} disposed", self.id);
    }

    fn draw_frame(&mut self, index: usize) -> Result<()> {
        let Some(image) = self
            .store
            .decoded(index)
            .context("Failed to decode frame")?
        else {
            return Ok(());
        };

        let (media_w, media_h) = self
            .metadata
            .map(|m| (m.width, m.height))
            .unwrap_or((0, 0));
        if let Some(comp) = self.compositor.as_mut() {
            comp.draw(&image, media_w, media_h);
        }

        self.with_view(|v| v.current_frame = index);
        Ok(())
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.view.lock().expect("lock").phase = phase;
    }

    fn with_view<F: FnOnce(&mut ViewState)>(&self, f: F) {
        f(&mut self.view.lock().expect("lock"));
    }
}

impl Drop for VideoSession {
    fn drop(&mut self) {
        if self.phase != Phase::Disposed {
            self.cleanup();
        }
    }
}

/// Fixed input name, keeping only the extension of the uploaded file.
fn input_name(source_name: &str) -> String {
    let ext = Path::new(source_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    format!("{}.{}", INPUT_STEM, ext)
}
