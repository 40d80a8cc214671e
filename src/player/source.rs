use serde::{Deserialize, Serialize};
use url::Url;

/// Which backend a source URL is played with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    AdaptiveStream,
    EmbeddedWidget,
}

impl MediaKind {
    /// Recognized widget-hosting URLs map to the widget; anything else is
    /// treated as an adaptive-stream manifest.
    pub fn detect(url: &str) -> Self {
        if widget_video_id(url).is_some() {
            MediaKind::EmbeddedWidget
        } else {
            MediaKind::AdaptiveStream
        }
    }
}

const WATCH_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

const SHORT_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];

const PATH_PREFIXES: &[&str] = &["embed", "shorts", "live", "v"];

/// Extract the widget video id from a recognized hosting URL
///
/// Accepted shapes (scheme optional):
/// - `youtube.com/watch?v=ID`
/// - `youtu.be/ID`
/// - `youtube.com/{embed,shorts,live,v}/ID`
pub fn widget_video_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = if raw.contains("://") {
        Url::parse(raw).ok()?
    } else {
        Url::parse(&format!("https://{}", raw)).ok()?
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?.to_ascii_lowercase();
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());

    let candidate = if SHORT_HOSTS.contains(&host.as_str()) {
        segments.next().map(str::to_string)
    } else if WATCH_HOSTS.contains(&host.as_str()) {
        match segments.next() {
            Some("watch") => parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some(prefix) if PATH_PREFIXES.contains(&prefix) => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate.filter(|id| is_video_id(id))
}

fn is_video_id(id: &str) -> bool {
    id.len() == 11
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_urls() {
        assert_eq!(
            widget_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            widget_video_id("https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            widget_video_id("youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_short_and_path_urls() {
        assert_eq!(
            widget_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            widget_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            widget_video_id("https://www.youtube.com/shorts/aBcDeFgHi_-").as_deref(),
            Some("aBcDeFgHi_-")
        );
        assert_eq!(
            widget_video_id("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_unrecognized_urls() {
        assert_eq!(widget_video_id("https://cdn.example.com/live/master.m3u8"), None);
        assert_eq!(widget_video_id("https://www.youtube.com/channel/UC123"), None);
        assert_eq!(widget_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(widget_video_id("ftp://youtu.be/dQw4w9WgXcQ"), None);
        assert_eq!(widget_video_id("https://notyoutube.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(widget_video_id("not a url at all"), None);
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(MediaKind::detect("https://youtu.be/dQw4w9WgXcQ"), MediaKind::EmbeddedWidget);
        assert_eq!(
            MediaKind::detect("https://cdn.example.com/vod/master.m3u8"),
            MediaKind::AdaptiveStream
        );
        assert_eq!(MediaKind::detect(""), MediaKind::AdaptiveStream);
    }
}
