//! Fixed host/path pattern tables for URL classification (§6).

use once_cell_patterns::Lazy;
use regex::Regex;

/// Thin local stand-in so this module doesn't need to pull in `once_cell`
/// just for a handful of lazily-compiled regexes.
mod once_cell_patterns {
    pub use std::sync::OnceLock as Lazy;
}

fn youtube_re() -> &'static Regex {
    static RE: Lazy<Regex> = Lazy::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([A-Za-z0-9_-]{11})").unwrap()
    })
}

fn rumble_re() -> &'static Regex {
    static RE: Lazy<Regex> = Lazy::new();
    RE.get_or_init(|| Regex::new(r"rumble\.com/(?:embed/)?(v[A-Za-z0-9]+)").unwrap())
}

fn peertube_re() -> &'static Regex {
    static RE: Lazy<Regex> = Lazy::new();
    RE.get_or_init(|| {
        Regex::new(r"(?P<instance>https?://[^/]+)/videos/watch/(?P<uuid>[0-9a-fA-F-]{36})").unwrap()
    })
}

/// `youtube.com/watch?v=<id11>`, `youtu.be/<id11>`, `youtube.com/embed/<id11>`
pub fn classify_youtube(url: &str) -> Option<String> {
    youtube_re().captures(url).map(|c| c[1].to_string())
}

/// `rumble.com/v<id>[-slug][.html]`, `rumble.com/embed/v<id>`
pub fn classify_rumble(url: &str) -> Option<String> {
    rumble_re().captures(url).map(|c| c[1].to_string())
}

/// `<instance>/videos/watch/<uuid>`. Returns `(instance_base_url, uuid)`.
pub fn classify_peertube(url: &str) -> Option<(String, String)> {
    peertube_re()
        .captures(url)
        .map(|c| (c["instance"].to_string(), c["uuid"].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_patterns() {
        assert_eq!(classify_youtube("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".into()));
        assert_eq!(classify_youtube("https://youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".into()));
        assert_eq!(classify_youtube("https://www.youtube.com/embed/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".into()));
        assert_eq!(classify_youtube("https://example.com"), None);
    }

    #[test]
    fn rumble_patterns() {
        assert_eq!(classify_rumble("https://rumble.com/v1a2b3c-some-slug.html"), Some("v1a2b3c".into()));
        assert_eq!(classify_rumble("https://rumble.com/embed/v1a2b3c"), Some("v1a2b3c".into()));
    }

    #[test]
    fn peertube_pattern() {
        let got = classify_peertube("https://tilvids.com/videos/watch/11111111-2222-3333-4444-555555555555");
        assert_eq!(got, Some(("https://tilvids.com".into(), "11111111-2222-3333-4444-555555555555".into())));
    }
}
