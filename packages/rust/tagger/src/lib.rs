//! Part-of-speech tagging boundary.
//!
//! This crate provides:
//! - [`Tagger`]: the contract every tagging backend implements
//! - [`TaggerRegistry`]: language code → tagger lookup with bounded retries
//! - [`HttpTagger`]: client for an external tagging service
//! - [`tokenize`]: splits a sentence into the tokens sent to the tagger
//!
//! Raw tags are classified into [`TagClass`](sitegraph_shared::TagClass) here,
//! once, so downstream code never re-inspects tag strings.

mod http;
mod retry;
mod tokenize;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use sitegraph_shared::{Result, TaggerConfig, Token};

pub use http::HttpTagger;
pub use retry::RetryPolicy;
pub use tokenize::tokenize;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A tagging backend for one or more languages.
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Tag an ordered list of tokens, returning one [`Token`] per tagged word.
    async fn tag(&self, tokens: &[String], language: &str) -> Result<Vec<Token>>;

    /// Human-readable backend name for tracing.
    fn name(&self) -> &str;
}

/// Outcome of a registry lookup + tagging call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tagged {
    /// The sentence was tagged.
    Tokens(Vec<Token>),
    /// No tagger is registered for the language; nothing was tagged.
    UnsupportedLanguage,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps language codes to taggers. Built once and handed to the pipeline.
#[derive(Clone)]
pub struct TaggerRegistry {
    taggers: HashMap<String, Arc<dyn Tagger>>,
    retry: RetryPolicy,
}

impl TaggerRegistry {
    /// Create an empty registry using `retry` for every call.
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            taggers: HashMap::new(),
            retry,
        }
    }

    /// Build a registry that routes every configured language to one HTTP tagger.
    pub fn from_config(config: &TaggerConfig) -> Result<Self> {
        let tagger: Arc<dyn Tagger> = Arc::new(HttpTagger::new(&config.endpoint, config.timeout)?);
        let mut registry = Self::new(RetryPolicy::from(config));
        for language in &config.languages {
            registry.register(language, tagger.clone());
        }
        Ok(registry)
    }

    /// Register `tagger` for `language` (case-insensitive), replacing any previous one.
    pub fn register(&mut self, language: &str, tagger: Arc<dyn Tagger>) -> &mut Self {
        self.taggers.insert(language.to_ascii_lowercase(), tagger);
        self
    }

    /// Whether a tagger is registered for `language`.
    pub fn supports(&self, language: &str) -> bool {
        self.taggers.contains_key(&language.to_ascii_lowercase())
    }

    /// Registered language codes, sorted.
    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.taggers.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }

    /// Tag `tokens` in `language`, retrying transient failures per the policy.
    #[instrument(skip_all, fields(language = %language, tokens = tokens.len()))]
    pub async fn tag(&self, tokens: &[String], language: &str) -> Result<Tagged> {
        let language = language.to_ascii_lowercase();
        let Some(tagger) = self.taggers.get(&language) else {
            debug!("no tagger registered");
            return Ok(Tagged::UnsupportedLanguage);
        };

        let language: &str = &language;
        let tagged = self
            .retry
            .run(tagger.name(), || tagger.tag(tokens, language))
            .await?;
        Ok(Tagged::Tokens(tagged))
    }
}

impl std::fmt::Debug for TaggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggerRegistry")
            .field("languages", &self.languages())
            .field("retry", &self.retry)
            .finish()
    }
}
