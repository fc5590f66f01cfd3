//! Probe sidecar parsing and metadata normalization.
//!
//! The engine's probe writes a JSON sidecar describing the input's streams.
//! Resolution never fails: any shape violation is recovered locally by
//! falling back to the default frame rate with dimensions unresolved, logged
//! for diagnostics only. Policy decisions (smallest reported rate wins,
//! non-numeric frame counts read as 0) are documented in DESIGN.md.

use log::warn;
use serde::Deserialize;

/// Fallback frame rate applied when the probe reports none or an unusable
/// (zero) rate.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Stream classification from the sidecar.
///
/// Anything outside the known set normalizes to `Unknown` instead of
/// failing the parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum StreamKind {
    Video,
    Audio,
    Unknown,
}

impl From<String> for StreamKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "video" => StreamKind::Video,
            "audio" => StreamKind::Audio,
            _ => StreamKind::Unknown,
        }
    }
}

/// Sidecar shape: `{ "streams": [ { codec_type, width, height, nb_frames,
/// r_frame_rate } ] }`. serde is the shape check; missing or mistyped
/// fields fail the whole parse.
#[derive(Debug, Deserialize)]
struct ProbeReport {
    streams: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    codec_type: StreamKind,
    width: u32,
    height: u32,
    /// Frame count as a numeric string (probe output convention)
    nb_frames: String,
    /// Rational rate: `"numerator/denominator"`
    r_frame_rate: String,
}

/// Normalized per-load metadata. Produced once per successful load,
/// superseded wholesale on reload, never partially mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub total_frames: u64,
}

impl VideoMetadata {
    /// Parse a sidecar and normalize it, falling back on any shape violation.
    pub fn resolve(sidecar: &[u8], default_rate: f64) -> Self {
        let report: ProbeReport = match serde_json::from_slice(sidecar) {
            Ok(report) => report,
            Err(e) => {
                warn!("Malformed probe sidecar ({}), falling back to defaults", e);
                return Self::fallback(default_rate);
            }
        };

        match Self::from_report(&report, default_rate) {
            Some(metadata) => metadata,
            None => {
                warn!("Probe sidecar reported non-positive dimensions, falling back to defaults");
                Self::fallback(default_rate)
            }
        }
    }

    /// Defaults used when the sidecar is unusable: the caller-supplied rate,
    /// dimensions unresolved (0x0, skips dimension-dependent layout), zero
    /// frames.
    pub fn fallback(default_rate: f64) -> Self {
        Self {
            frame_rate: default_rate,
            width: 0,
            height: 0,
            total_frames: 0,
        }
    }

    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    fn from_report(report: &ProbeReport, default_rate: f64) -> Option<Self> {
        // Non-positive dimensions on any entry are a shape violation
        if report.streams.iter().any(|s| s.width == 0 || s.height == 0) {
            return None;
        }

        // Smallest reported rate across entries wins (ascending, take first);
        // a zero rate ("0/1" or denominator 0) is unusable and defaults
        let mut rates: Vec<f64> = report
            .streams
            .iter()
            .filter_map(|s| parse_rational(&s.r_frame_rate))
            .collect();
        rates.sort_by(f64::total_cmp);
        let frame_rate = rates
            .first()
            .copied()
            .filter(|r| *r > 0.0)
            .unwrap_or(default_rate);

        // Same ascending-take-first policy for the frame count
        let mut counts: Vec<u64> = report
            .streams
            .iter()
            .filter_map(|s| parse_frame_count(&s.nb_frames))
            .collect();
        counts.sort_unstable();
        let total_frames = counts.first().copied().unwrap_or(0);

        // Dimensions: first video stream, falling back to the first entry
        // (the probe is asked for video streams only)
        let (width, height) = report
            .streams
            .iter()
            .find(|s| s.codec_type == StreamKind::Video)
            .or_else(|| report.streams.first())
            .map(|s| (s.width, s.height))
            .unwrap_or((0, 0));

        Some(Self {
            frame_rate,
            width,
            height,
            total_frames,
        })
    }
}

/// Parse a rational `"num/den"` rate.
///
/// Denominator 0 yields `Some(0.0)` rather than a division error; the
/// caller's zero-rate fallback handles it. Missing `/` or non-numeric parts
/// yield None.
fn parse_rational(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;

    if den == 0.0 {
        return Some(0.0);
    }

    Some(num / den)
}

/// Parse a numeric-string frame count; non-numeric input yields None,
/// which resolution treats as 0.
fn parse_frame_count(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sidecar(streams: &str) -> Vec<u8> {
        format!(r#"{{"streams": [{streams}]}}"#).into_bytes()
    }

    fn video_stream(fps: &str, frames: &str) -> String {
        format!(
            r#"{{"codec_type": "video", "width": 1920, "height": 1080,
                 "nb_frames": "{frames}", "r_frame_rate": "{fps}"}}"#
        )
    }

    #[test]
    fn test_ntsc_rational_rate() {
        let m = VideoMetadata::resolve(&sidecar(&video_stream("30000/1001", "150")), 30.0);
        assert!((m.frame_rate - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_integer_rational_rate() {
        let m = VideoMetadata::resolve(&sidecar(&video_stream("24/1", "150")), 30.0);
        assert_eq!(m.frame_rate, 24.0);
        assert_eq!(m.width, 1920);
        assert_eq!(m.height, 1080);
        assert_eq!(m.total_frames, 150);
    }

    #[test]
    fn test_zero_denominator_defaults() {
        // "0/1" resolves to rate 0, which is unusable and raises the default
        let m = VideoMetadata::resolve(&sidecar(&video_stream("0/1", "150")), 30.0);
        assert_eq!(m.frame_rate, 30.0);

        let m = VideoMetadata::resolve(&sidecar(&video_stream("24/0", "150")), 30.0);
        assert_eq!(m.frame_rate, 30.0);
    }

    #[test]
    fn test_smallest_rate_wins() {
        let streams = format!(
            "{},{}",
            video_stream("60/1", "300"),
            video_stream("24/1", "120")
        );
        let m = VideoMetadata::resolve(&sidecar(&streams), 30.0);

        assert_eq!(m.frame_rate, 24.0);
        assert_eq!(m.total_frames, 120);
    }

    #[test]
    fn test_non_numeric_frame_count_reads_as_zero() {
        let m = VideoMetadata::resolve(&sidecar(&video_stream("24/1", "N/A")), 30.0);
        assert_eq!(m.total_frames, 0);
        assert_eq!(m.frame_rate, 24.0);
    }

    #[test]
    fn test_unknown_codec_type_normalizes() {
        let entry = r#"{"codec_type": "subtitle", "width": 640, "height": 480,
                        "nb_frames": "10", "r_frame_rate": "25/1"}"#;
        let m = VideoMetadata::resolve(&sidecar(entry), 30.0);

        // Parse succeeds, the unknown kind does not fail the shape check
        assert_eq!(m.frame_rate, 25.0);
        assert_eq!(m.width, 640);
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let m = VideoMetadata::resolve(b"{\"streams\": oops", 30.0);

        assert_eq!(m.frame_rate, 30.0);
        assert!(!m.has_dimensions());
        assert_eq!(m.total_frames, 0);
    }

    #[test]
    fn test_missing_field_falls_back() {
        let entry = r#"{"codec_type": "video", "width": 1920, "height": 1080}"#;
        let m = VideoMetadata::resolve(&sidecar(entry), 25.0);

        assert_eq!(m.frame_rate, 25.0);
        assert!(!m.has_dimensions());
    }

    #[test]
    fn test_zero_dimension_is_shape_violation() {
        let entry = r#"{"codec_type": "video", "width": 0, "height": 1080,
                        "nb_frames": "10", "r_frame_rate": "25/1"}"#;
        let m = VideoMetadata::resolve(&sidecar(entry), 30.0);

        assert_eq!(m.frame_rate, 30.0);
        assert!(!m.has_dimensions());
    }

    #[test]
    fn test_empty_stream_list_defaults_quietly() {
        let m = VideoMetadata::resolve(&sidecar(""), 30.0);

        assert_eq!(m.frame_rate, 30.0);
        assert_eq!(m.total_frames, 0);
        assert!(!m.has_dimensions());
    }

    #[test]
    fn test_non_rational_rate_is_skipped() {
        let m = VideoMetadata::resolve(&sidecar(&video_stream("24", "100")), 30.0);
        // No usable rate candidate, default applies; the rest still resolves
        assert_eq!(m.frame_rate, 30.0);
        assert_eq!(m.total_frames, 100);
    }
}
