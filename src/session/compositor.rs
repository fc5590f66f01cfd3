//! Aspect-preserving frame compositing onto a drawing surface.
//!
//! The destination surface (canvas, window, texture) is owned by the host
//! and reached through [`DrawSurface`]. The compositor computes a centered
//! letterbox/pillarbox rectangle from the media dimensions and the current
//! surface size, clears the previously painted area, and paints the frame.

use image::RgbaImage;
use log::debug;
use std::sync::Arc;

use anyhow::{bail, Result};

/// Computed draw rectangle, in surface coordinates. Derived state: it is
/// recomputed whenever metadata or the surface size changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Host-owned 2D drawing surface.
///
/// `has_context` reports whether a 2D context can be bound; a surface
/// without one cannot be used and fails session initialization.
pub trait DrawSurface: Send + Sync {
    fn client_width(&self) -> f32;
    fn client_height(&self) -> f32;
    fn has_context(&self) -> bool;
    fn clear_rect(&self, rect: DrawRect);
    fn draw_image(&self, image: &RgbaImage, rect: DrawRect);
}

/// Fit media of `media_w` x `media_h` into a `dest_w` x `dest_h` surface,
/// preserving aspect ratio and centering the result.
///
/// Wide media spans the full destination width, tall media the full height,
/// square media both. Returns None while media dimensions are unresolved
/// (zero): dimension-dependent layout is skipped until metadata resolves.
pub fn fit_rect(media_w: u32, media_h: u32, dest_w: f32, dest_h: f32) -> Option<DrawRect> {
    if media_w == 0 || media_h == 0 {
        return None;
    }

    let aspect = media_w as f32 / media_h as f32;
    let (width, height) = if aspect > 1.0 {
        (dest_w, dest_h / aspect)
    } else if aspect < 1.0 {
        (dest_w * aspect, dest_h)
    } else {
        (dest_w, dest_h)
    };

    Some(DrawRect {
        x: (dest_w - width) / 2.0,
        y: (dest_h - height) / 2.0,
        width,
        height,
    })
}

/// Paints frames into a bound surface, clearing the previous frame's area
/// before each draw so no stale pixels survive a rect change.
pub struct Compositor {
    surface: Arc<dyn DrawSurface>,
    last_rect: Option<DrawRect>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("last_rect", &self.last_rect)
            .finish()
    }
}

impl Compositor {
    /// Bind a surface. Fails when the surface cannot produce a 2D context;
    /// that is a programming-contract violation, not a runtime condition.
    pub fn bind(surface: Arc<dyn DrawSurface>) -> Result<Self> {
        if !surface.has_context() {
            bail!("Drawing surface has no 2D context");
        }

        Ok(Self {
            surface,
            last_rect: None,
        })
    }

    /// Draw `image` letterboxed for media of `media_w` x `media_h`.
    ///
    /// The rect is recomputed on every call so surface resizes are picked
    /// up. Returns whether anything was painted.
    pub fn draw(&mut self, image: &RgbaImage, media_w: u32, media_h: u32) -> bool {
        let dest_w = self.surface.client_width();
        let dest_h = self.surface.client_height();

        let Some(rect) = fit_rect(media_w, media_h, dest_w, dest_h) else {
            debug!("Media dimensions unresolved, skipping draw");
            return false;
        };

        if let Some(prev) = self.last_rect.take() {
            self.surface.clear_rect(prev);
        }
        self.surface.draw_image(image, rect);
        self.last_rect = Some(rect);

        true
    }

    /// Clear whatever the last draw painted, if anything.
    pub fn clear(&mut self) {
        if let Some(prev) = self.last_rect.take() {
            self.surface.clear_rect(prev);
        }
    }
}
