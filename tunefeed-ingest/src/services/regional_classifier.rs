//! Regional relevance classifier
//!
//! Scores track metadata against a table of independent signals and accepts
//! the track when the weighted score reaches a threshold. The rule table is
//! plain data (see `[classifier]` in the service configuration); the defaults
//! target Vietnamese music.
//!
//! Weights are non-negative, so adding a matching signal can never turn an
//! eligible track ineligible.

use serde::{Deserialize, Serialize};

use crate::models::track::TrackMetadata;

/// Individual classifier signals, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Artist name contains a regional keyword
    ArtistKeyword,
    /// Title contains a regional keyword
    TitleKeyword,
    /// Artist name equals a known regional artist (case-insensitive)
    KnownArtist,
    /// Title or artist contains a regional diacritic character
    Diacritics,
    /// Feed country hint equals the regional country code
    CountryCode,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::ArtistKeyword,
        Signal::TitleKeyword,
        Signal::KnownArtist,
        Signal::Diacritics,
        Signal::CountryCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::ArtistKeyword => "artist_keyword",
            Signal::TitleKeyword => "title_keyword",
            Signal::KnownArtist => "known_artist",
            Signal::Diacritics => "diacritics",
            Signal::CountryCode => "country_code",
        }
    }
}

/// Per-signal weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub artist_keyword: f64,
    pub title_keyword: f64,
    pub known_artist: f64,
    pub diacritics: f64,
    pub country_code: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            artist_keyword: 1.0,
            title_keyword: 1.0,
            known_artist: 1.0,
            diacritics: 1.0,
            country_code: 1.0,
        }
    }
}

impl SignalWeights {
    pub fn weight(&self, signal: Signal) -> f64 {
        let w = match signal {
            Signal::ArtistKeyword => self.artist_keyword,
            Signal::TitleKeyword => self.title_keyword,
            Signal::KnownArtist => self.known_artist,
            Signal::Diacritics => self.diacritics,
            Signal::CountryCode => self.country_code,
        };
        // Negative weights would break monotonicity
        if w.is_finite() { w.max(0.0) } else { 0.0 }
    }
}

/// Classifier rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    /// Substrings (lower-case) that mark a title or artist as regional
    pub keywords: Vec<String>,
    /// Artist names (lower-case), matched exactly
    pub known_artists: Vec<String>,
    /// Characters specific to the regional script
    pub diacritics: String,
    pub country_code: String,
    pub weights: SignalWeights,
    /// Minimum score for eligibility
    pub threshold: f64,
    /// Catalog genre assigned to imported tracks
    pub genre_name: String,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            keywords: [
                "việt", "viet", "vn", "hanoi", "hồ chí minh", "sài gòn", "saigon",
                "nhạc trẻ", "nhac tre", "v-pop", "vpop", "vietnam", "việt nam",
                "hà nội", "đà nẵng", "huế", "cần thơ",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            known_artists: [
                "soobin hoang son", "soobin", "sơn tùng mtp", "sơn tùng", "den vau",
                "đen", "jack j97", "jack", "min", "erik", "justatee", "bigdaddy",
                "emy", "karik", "bích phương", "đàm vĩnh hưng", "mỹ tâm",
                "noo phước thịnh", "tuấn hưng", "binz", "suboi", "da lab", "wowy",
                "rhymastic",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            diacritics: "áàảãạăắằẳẵặâấầẩẫậéèẻẽẹêếềểễệíìỉĩịóòỏõọôốồổỗộơớờởỡợúùủũụưứừửữựýỳỷỹỵđ"
                .to_string(),
            country_code: "VN".to_string(),
            weights: SignalWeights::default(),
            threshold: 2.0,
            genre_name: "Nhạc Việt".to_string(),
        }
    }
}

/// Classifier verdict for one track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub is_eligible: bool,
    pub matched_signal_count: usize,
    /// Weighted sum of matched signals
    pub score: f64,
    /// Matched signals in evaluation order
    pub reasons: Vec<Signal>,
}

impl ClassificationResult {
    pub fn reason_names(&self) -> Vec<String> {
        self.reasons.iter().map(|s| s.as_str().to_string()).collect()
    }
}

/// Regional relevance classifier
#[derive(Debug, Clone)]
pub struct RegionalClassifier {
    rules: ClassifierRules,
}

impl Default for RegionalClassifier {
    fn default() -> Self {
        Self::new(ClassifierRules::default())
    }
}

impl RegionalClassifier {
    /// Build a classifier; keyword and artist lists are normalized to lower case
    pub fn new(mut rules: ClassifierRules) -> Self {
        rules.keywords = normalize_list(rules.keywords);
        rules.known_artists = normalize_list(rules.known_artists);
        rules.diacritics = rules.diacritics.to_lowercase();
        Self { rules }
    }

    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    /// Evaluate every signal and compare the weighted score to the threshold
    pub fn classify(&self, track: &TrackMetadata) -> ClassificationResult {
        let title = track.title.to_lowercase();
        let artist = track.artist_name.to_lowercase();

        let reasons: Vec<Signal> = Signal::ALL
            .into_iter()
            .filter(|signal| match signal {
                Signal::ArtistKeyword => self.contains_keyword(&artist),
                Signal::TitleKeyword => self.contains_keyword(&title),
                Signal::KnownArtist => {
                    let name = artist.trim();
                    self.rules.known_artists.iter().any(|a| a == name)
                }
                Signal::Diacritics => {
                    self.contains_diacritic(&title) || self.contains_diacritic(&artist)
                }
                Signal::CountryCode => track
                    .country_hint
                    .as_deref()
                    .map_or(false, |c| c.trim().eq_ignore_ascii_case(&self.rules.country_code)),
            })
            .collect();

        let score: f64 = reasons.iter().map(|s| self.rules.weights.weight(*s)).sum();

        ClassificationResult {
            is_eligible: score >= self.rules.threshold,
            matched_signal_count: reasons.len(),
            score,
            reasons,
        }
    }

    /// Whether free text (e.g. a search query) already carries a regional signal
    pub fn has_regional_marker(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.contains_keyword(&lower) || self.contains_diacritic(&lower)
    }

    fn contains_keyword(&self, lower: &str) -> bool {
        self.rules.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    fn contains_diacritic(&self, lower: &str) -> bool {
        lower.chars().any(|c| self.rules.diacritics.contains(c))
    }
}

fn normalize_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
