//! Track metadata as delivered by the catalog feed
//!
//! The feed schema belongs to the external provider; only the fields the
//! pipeline reads are modelled here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of feed results (`{ "data": [...] }`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPage {
    /// Track items; absent `data` is treated as an empty page
    #[serde(default)]
    pub data: Vec<FeedItem>,
}

/// Raw feed item
#[derive(Debug, Clone, Deserialize)]
pub struct FeedItem {
    /// Provider track id (numeric or string depending on endpoint)
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    /// Track length in seconds
    #[serde(default)]
    pub duration: Option<u32>,
    /// Preview URL (often an empty string when unavailable)
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub artist: Option<FeedArtist>,
    #[serde(default)]
    pub album: Option<FeedAlbum>,
}

/// Artist block of a feed item
#[derive(Debug, Clone, Deserialize)]
pub struct FeedArtist {
    #[serde(default)]
    pub name: Option<String>,
    /// ISO country code, when the provider supplies one
    #[serde(default)]
    pub country: Option<String>,
}

/// Album block of a feed item
#[derive(Debug, Clone, Deserialize)]
pub struct FeedAlbum {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cover_medium: Option<String>,
}

/// Normalized, immutable track metadata consumed by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub external_id: String,
    pub title: String,
    pub artist_name: String,
    pub album_title: Option<String>,
    pub duration_seconds: Option<u32>,
    pub preview_url: Option<String>,
    pub country_hint: Option<String>,
    pub cover_url: Option<String>,
}

impl TrackMetadata {
    /// Minimal constructor used by callers that do not come from the feed
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        artist_name: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            artist_name: artist_name.into(),
            album_title: None,
            duration_seconds: None,
            preview_url: None,
            country_hint: None,
            cover_url: None,
        }
    }

    pub fn with_preview_url(mut self, url: impl Into<String>) -> Self {
        self.preview_url = Some(url.into());
        self
    }

    pub fn with_country_hint(mut self, country: impl Into<String>) -> Self {
        self.country_hint = Some(country.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album_title = Some(album.into());
        self
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// Convert a raw feed item
    ///
    /// Returns `None` for items missing a title, an artist name or an album block,
    /// which the import never accepts.
    pub fn from_feed_item(item: &FeedItem) -> Option<Self> {
        let title = non_blank(item.title.as_deref())?;
        let artist = item.artist.as_ref()?;
        let artist_name = non_blank(artist.name.as_deref())?;
        let album = item.album.as_ref()?;

        let external_id = match &item.id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };

        Some(Self {
            external_id,
            title,
            artist_name,
            album_title: non_blank(album.title.as_deref()),
            duration_seconds: item.duration,
            preview_url: non_blank(item.preview.as_deref()),
            country_hint: non_blank(artist.country.as_deref()),
            cover_url: non_blank(album.cover_medium.as_deref()),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
