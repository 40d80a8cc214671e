//! HLS manifest client
//!
//! Fetches a playlist, follows a master playlist to its first variant, and parses
//! the media playlist far enough to know the media duration.

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Variant stream listed in a master playlist
#[derive(Debug, Clone, PartialEq)]
pub struct VariantStream {
    pub uri: String,
    pub bandwidth: u64,
    pub resolution: Option<(u32, u32)>,
}

/// Media segment with its `#EXTINF` duration
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub uri: String,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaPlaylist {
    pub target_duration: Option<f64>,
    pub segments: Vec<Segment>,
    /// `#EXT-X-ENDLIST` seen (or VOD playlist type): no segments will be added
    pub ended: bool,
}

impl MediaPlaylist {
    /// Total duration for finished playlists; live playlists have none
    pub fn duration(&self) -> Option<f64> {
        if self.ended {
            Some(self.segments.iter().map(|s| s.duration).sum())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    Master(Vec<VariantStream>),
    Media(MediaPlaylist),
}

/// Parsed manifest ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// URL of the media playlist actually used
    pub media_url: String,
    pub variants: Vec<VariantStream>,
    pub playlist: MediaPlaylist,
}

impl Manifest {
    pub fn duration(&self) -> Option<f64> {
        self.playlist.duration()
    }
}

/// Streaming-protocol transport: fetches playlist text
#[async_trait::async_trait]
pub trait ManifestLoader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches playlists over HTTP(S)
pub struct HttpManifestLoader {
    client: reqwest::Client,
}

impl HttpManifestLoader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ManifestLoader for HttpManifestLoader {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch manifest {}", url))?
            .error_for_status()
            .with_context(|| format!("Manifest request rejected: {}", url))?;

        response
            .text()
            .await
            .with_context(|| format!("Failed to read manifest body {}", url))
    }
}

/// Fetch and parse a manifest, following a master playlist one level down
pub async fn load_manifest(loader: &dyn ManifestLoader, url: &str) -> Result<Manifest> {
    let base = Url::parse(url).with_context(|| format!("Malformed source URL: {}", url))?;
    let text = loader.fetch(url).await?;

    match parse_playlist(&text)? {
        Playlist::Media(playlist) => {
            debug!("Media playlist {} ({} segments)", url, playlist.segments.len());
            Ok(Manifest {
                media_url: url.to_string(),
                variants: Vec::new(),
                playlist,
            })
        }
        Playlist::Master(variants) => {
            let first = &variants[0];
            let media_url = base
                .join(&first.uri)
                .with_context(|| format!("Bad variant URI {}", first.uri))?
                .to_string();

            info!(
                "Master playlist with {} variants, using {} ({} bps)",
                variants.len(),
                media_url,
                first.bandwidth
            );

            let text = loader.fetch(&media_url).await?;
            match parse_playlist(&text)? {
                Playlist::Media(playlist) => Ok(Manifest {
                    media_url,
                    variants,
                    playlist,
                }),
                Playlist::Master(_) => bail!("Variant {} is itself a master playlist", media_url),
            }
        }
    }
}

/// Parse playlist text
pub fn parse_playlist(text: &str) -> Result<Playlist> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some("#EXTM3U") => {}
        _ => bail!("Not an HLS playlist: missing #EXTM3U header"),
    }

    let mut variants = Vec::new();
    let mut media = MediaPlaylist::default();
    let mut pending_variant: Option<VariantStream> = None;
    let mut pending_duration: Option<f64> = None;

    for line in lines {
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            pending_variant = Some(parse_stream_inf(attrs));
        } else if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let value = rest.split(',').next().unwrap_or_default().trim();
            let duration: f64 = value
                .parse()
                .with_context(|| format!("Bad #EXTINF duration: {}", value))?;
            pending_duration = Some(duration);
        } else if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            media.target_duration = value.trim().parse().ok();
        } else if line == "#EXT-X-ENDLIST" || line == "#EXT-X-PLAYLIST-TYPE:VOD" {
            media.ended = true;
        } else if line.starts_with('#') {
            continue;
        } else if let Some(mut variant) = pending_variant.take() {
            variant.uri = line.to_string();
            variants.push(variant);
        } else if let Some(duration) = pending_duration.take() {
            media.segments.push(Segment {
                uri: line.to_string(),
                duration,
            });
        }
    }

    if !variants.is_empty() {
        return Ok(Playlist::Master(variants));
    }

    if media.segments.is_empty() {
        bail!("Playlist has neither variants nor segments");
    }

    Ok(Playlist::Media(media))
}

fn parse_stream_inf(attrs: &str) -> VariantStream {
    let mut variant = VariantStream {
        uri: String::new(),
        bandwidth: 0,
        resolution: None,
    };

    for (key, value) in parse_attributes(attrs) {
        match key.as_str() {
            "BANDWIDTH" => variant.bandwidth = value.parse().unwrap_or(0),
            "RESOLUTION" => {
                variant.resolution = value
                    .split_once('x')
                    .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)));
            }
            _ => {}
        }
    }

    variant
}

/// Split an attribute list, honoring quoted values (`CODECS="a,b"`)
fn parse_attributes(input: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => {
                push_attribute(&current, &mut out);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_attribute(&current, &mut out);

    out
}

fn push_attribute(item: &str, out: &mut Vec<(String, String)>) {
    if let Some((k, v)) = item.split_once('=') {
        out.push((k.trim().to_string(), v.trim().trim_matches('"').to_string()));
    }
}
