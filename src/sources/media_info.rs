//! Media-info extractor (§6 Glossary): an external tool that, given a video
//! page URL, returns playable-stream URLs and metadata. Treated as an
//! opaque sync dependency, isolated in a bounded `spawn_blocking` pool per
//! §9's replacement for "worker pool for sync extraction".

use async_trait::async_trait;

use crate::errors::{ErrorCategory, PlatformError};

#[derive(Debug, Clone)]
pub struct MediaFormat {
    pub url: String,
    pub is_audio_only: bool,
    pub bitrate_kbps: Option<u32>,
    pub format_tag: String,
}

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub title: String,
    pub channel: String,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub formats: Vec<MediaFormat>,
}

/// Format selection order per §4.E.1: best audio-only -> highest-bitrate
/// audio-containing format -> any format with a URL.
pub fn select_best_format(formats: &[MediaFormat]) -> Option<&MediaFormat> {
    formats
        .iter()
        .filter(|f| f.is_audio_only)
        .max_by_key(|f| f.bitrate_kbps.unwrap_or(0))
        .or_else(|| formats.iter().filter(|f| f.bitrate_kbps.is_some()).max_by_key(|f| f.bitrate_kbps.unwrap_or(0)))
        .or_else(|| formats.first())
}

#[async_trait]
pub trait MediaInfoExtractor: Send + Sync {
    /// Extract metadata and format list for `url`, optionally with a
    /// Netscape-format cookie file attached.
    async fn extract(&self, url: &str, cookie_file: Option<&str>) -> Result<MediaInfo, PlatformError>;
}

/// Placeholder extractor: this is a thin edge to an out-of-process binary
/// (yt-dlp-shape) that this crate treats as an external collaborator per
/// §1 "Out of scope". Runs the blocking call on the blocking pool so it
/// never stalls the cooperative event loop (§5, §9).
pub struct ExternalMediaInfoExtractor {
    pub binary_path: String,
}

#[async_trait]
impl MediaInfoExtractor for ExternalMediaInfoExtractor {
    async fn extract(&self, url: &str, cookie_file: Option<&str>) -> Result<MediaInfo, PlatformError> {
        let binary = self.binary_path.clone();
        let url = url.to_string();
        let cookie_file = cookie_file.map(str::to_string);

        let result = tokio::task::spawn_blocking(move || run_extractor_binary(&binary, &url, cookie_file.as_deref()))
            .await
            .map_err(|e| PlatformError::from_category(ErrorCategory::Unknown, "youtube", e.to_string()))?;

        result
    }
}

fn run_extractor_binary(_binary: &str, _url: &str, _cookie_file: Option<&str>) -> Result<MediaInfo, PlatformError> {
    // The actual subprocess invocation is an out-of-scope external
    // collaborator (§1); adapters integrate against this seam in tests via
    // a fake `MediaInfoExtractor`.
    Err(PlatformError::from_category(
        ErrorCategory::Unknown,
        "youtube",
        "no media-info extractor binary configured",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_audio_only_highest_bitrate() {
        let formats = vec![
            MediaFormat { url: "a".into(), is_audio_only: false, bitrate_kbps: Some(500), format_tag: "video".into() },
            MediaFormat { url: "b".into(), is_audio_only: true, bitrate_kbps: Some(128), format_tag: "audio".into() },
            MediaFormat { url: "c".into(), is_audio_only: true, bitrate_kbps: Some(256), format_tag: "audio".into() },
        ];
        assert_eq!(select_best_format(&formats).unwrap().url, "c");
    }

    #[test]
    fn falls_back_to_highest_bitrate_any_format() {
        let formats = vec![
            MediaFormat { url: "a".into(), is_audio_only: false, bitrate_kbps: Some(500), format_tag: "video".into() },
            MediaFormat { url: "b".into(), is_audio_only: false, bitrate_kbps: Some(1200), format_tag: "video".into() },
        ];
        assert_eq!(select_best_format(&formats).unwrap().url, "b");
    }

    #[test]
    fn falls_back_to_any_url_when_no_bitrate_known() {
        let formats = vec![MediaFormat { url: "only".into(), is_audio_only: false, bitrate_kbps: None, format_tag: "unknown".into() }];
        assert_eq!(select_best_format(&formats).unwrap().url, "only");
    }
}
