//! Core domain types: crawled resources and tagged tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ResourceId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for resource identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub Uuid);

impl ResourceId {
    /// Generate a new time-sortable resource identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ResourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ResourceType
// ---------------------------------------------------------------------------

/// Declared type of a crawled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceType {
    Html,
    Image,
    Document,
}

impl ResourceType {
    /// Storage representation (matches the serde form).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::Image => "IMAGE",
            Self::Document => "DOCUMENT",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "HTML" => Ok(Self::Html),
            "IMAGE" => Ok(Self::Image),
            "DOCUMENT" => Ok(Self::Document),
            other => Err(format!("unknown resource type '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// One observed unit of crawled content.
///
/// Immutable once created; a later capture of the same `origin_url` produces a
/// new record rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique record identifier (UUID v7).
    pub id: ResourceId,
    /// Start URL of the crawl that produced this resource.
    pub root_url: String,
    /// URL this content was fetched from.
    pub origin_url: String,
    /// When the content was captured.
    pub captured_at: DateTime<Utc>,
    /// Declared type.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Links found on the page (HTML only, empty otherwise).
    #[serde(default)]
    pub outbound_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_keywords: Option<String>,
    /// Raw response body (UTF-8 markup for HTML, bytes otherwise).
    pub raw: Vec<u8>,
    /// Normalized plain text, one block per line (HTML only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_text: Option<String>,
    /// SHA-256 hex digest of the content.
    pub fingerprint: String,
    /// ISO 639-1 language code, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Grammatical classes relevant to graph extraction.
///
/// Decided once when a tagger result crosses into the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagClass {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Other,
}

impl TagClass {
    /// Classify a raw tagger tag.
    ///
    /// Understands the Universal POS tags plus the STTS (German) and Penn
    /// (English) fine-grained sets. `AUX`, `NUM` and `ADP` are `Other`.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_uppercase();
        match tag.as_str() {
            "NOUN" | "PROPN" | "NE" => Self::Noun,
            t if t.starts_with("NN") => Self::Noun,
            "VERB" => Self::Verb,
            // STTS VV*/VA*/VM*, Penn VB*
            t if t.starts_with('V') && t.len() > 1 => Self::Verb,
            t if t.starts_with("ADJ") || t.starts_with("JJ") => Self::Adjective,
            t if t.starts_with("ADV") || t.starts_with("RB") => Self::Adverb,
            _ => Self::Other,
        }
    }
}

/// A tagged token: surface form, lemma, raw tag and its class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub surface: String,
    pub lemma: String,
    pub tag: String,
    pub class: TagClass,
}

impl Token {
    /// Build a token, classifying `tag` with [`TagClass::from_tag`].
    pub fn new(surface: impl Into<String>, lemma: impl Into<String>, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            surface: surface.into(),
            lemma: lemma.into(),
            class: TagClass::from_tag(&tag),
            tag,
        }
    }
}
