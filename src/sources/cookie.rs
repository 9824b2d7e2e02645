//! Cookie-file conversion (§6): JSON cookie array → Netscape format, which
//! the media-info extractor requires. Output path is deterministic — a
//! sibling `.txt` file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct JsonCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(rename = "httpOnly", default)]
    pub http_only: bool,
    pub expires: Option<f64>,
}

/// Convert a JSON cookie file at `json_path` into Netscape format at the
/// deterministic sibling path, returning that path.
pub fn convert_to_netscape(json_path: &Path) -> std::io::Result<PathBuf> {
    let contents = std::fs::read_to_string(json_path)?;
    let cookies: Vec<JsonCookie> = serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let netscape = render_netscape(&cookies);

    let out_path = json_path.with_extension("txt");
    std::fs::write(&out_path, netscape)?;
    Ok(out_path)
}

fn render_netscape(cookies: &[JsonCookie]) -> String {
    let mut out = String::from("# Netscape HTTP Cookie File\n");
    for c in cookies {
        let domain_flag = if c.domain.starts_with('.') { "TRUE" } else { "FALSE" };
        let expires = c.expires.map(|e| e as i64).unwrap_or(0);
        out.push_str(&format!(
            "{domain}\t{flag}\t{path}\t{secure}\t{expires}\t{name}\t{value}\n",
            domain = c.domain,
            flag = domain_flag,
            path = c.path,
            secure = if c.secure { "TRUE" } else { "FALSE" },
            expires = expires,
            name = c.name,
            value = c.value,
        ));
    }
    out
}

/// Parse a previously-written Netscape file back into tuples, for the §8
/// round-trip law (`json -> netscape -> reparse` yields the same tuple set).
pub fn parse_netscape(contents: &str) -> Vec<(String, String, String, String, bool, i64)> {
    contents
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 7 {
                return None;
            }
            Some((
                fields[0].to_string(),
                fields[2].to_string(),
                fields[5].to_string(),
                fields[6].to_string(),
                fields[3] == "TRUE",
                fields[4].parse().unwrap_or(0),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_netscape_format() {
        let cookies = vec![JsonCookie {
            name: "session".into(),
            value: "abc123".into(),
            domain: ".youtube.com".into(),
            path: "/".into(),
            secure: true,
            http_only: true,
            expires: Some(1_700_000_000.0),
        }];
        let rendered = render_netscape(&cookies);
        let parsed = parse_netscape(&rendered);
        assert_eq!(parsed.len(), 1);
        let (domain, path, name, value, secure, expires) = parsed[0].clone();
        assert_eq!(domain, ".youtube.com");
        assert_eq!(path, "/");
        assert_eq!(name, "session");
        assert_eq!(value, "abc123");
        assert!(secure);
        assert_eq!(expires, 1_700_000_000);
    }
}
