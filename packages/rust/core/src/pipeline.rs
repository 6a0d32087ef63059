//! Ingest pipeline: fetched resource → normalize → change gate → store →
//! tag → extract → graph.
//!
//! One [`Pipeline`] owns the storage handle and the tagger registry. Each
//! resource is processed independently; a failure on one resource is recorded
//! in the [`IngestSummary`] and does not stop the others. Within a resource, a
//! tagging failure skips only the affected sentence.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use sitegraph_crawler::{CrawlResult, Crawler, FetchedResource, same_host_links};
use sitegraph_normalize::{normalize, sentences};
use sitegraph_shared::{
    GraphFragment, Resource, ResourceId, ResourceType, Result, SiteGraphError,
};
use sitegraph_storage::Storage;
use sitegraph_tagger::{Tagged, TaggerRegistry, tokenize};

use crate::change::{self, ChangeStatus};
use crate::extract::extract;
use crate::persist::{self, PersistReport};

/// Fetched resources buffered between the crawler and the ingest loop.
const CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of ingesting one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// HTML with no usable text after normalization; nothing stored.
    Empty,
    /// Fingerprint equals the latest stored capture; nothing stored.
    Unchanged,
    /// A new capture was stored.
    Stored(StoredResource),
}

/// Details of a stored capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResource {
    pub id: ResourceId,
    pub resource_type: ResourceType,
    /// [`ChangeStatus::New`] or [`ChangeStatus::Changed`].
    pub status: ChangeStatus,
    pub tagging: Tagging,
    pub sentences_tagged: usize,
    /// Sentences dropped after the tagger failed on them.
    pub sentences_skipped: usize,
    pub graph: PersistReport,
}

/// Whether the text of a stored resource went through the tagger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tagging {
    Performed { language: String },
    /// No tagger is registered for the document language.
    UnsupportedLanguage { language: String },
    /// The document declares no language and none was given.
    UnknownLanguage,
    /// Images and documents are stored but never tagged.
    NotText,
}

/// Result of extracting one sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentenceOutcome {
    Extracted(GraphFragment),
    /// Tagged, but fewer than two distinct nouns.
    NoRelationships,
    UnsupportedLanguage,
}

/// Aggregate counts for a batch or crawl.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub resources_new: usize,
    pub resources_changed: usize,
    pub resources_unchanged: usize,
    pub resources_empty: usize,
    pub resources_failed: usize,
    /// Stored text resources whose language had no tagger.
    pub resources_untagged: usize,
    pub sentences_tagged: usize,
    pub sentences_skipped: usize,
    pub graph: PersistReport,
    /// Failed resources (URL, error message).
    pub errors: Vec<(String, String)>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl IngestSummary {
    /// Number of resources that reached the pipeline.
    pub fn processed(&self) -> usize {
        self.resources_new
            + self.resources_changed
            + self.resources_unchanged
            + self.resources_empty
            + self.resources_failed
    }

    pub fn record(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Empty => self.resources_empty += 1,
            IngestOutcome::Unchanged => self.resources_unchanged += 1,
            IngestOutcome::Stored(stored) => {
                match stored.status {
                    ChangeStatus::Changed => self.resources_changed += 1,
                    _ => self.resources_new += 1,
                }
                if matches!(
                    stored.tagging,
                    Tagging::UnsupportedLanguage { .. } | Tagging::UnknownLanguage
                ) {
                    self.resources_untagged += 1;
                }
                self.sentences_tagged += stored.sentences_tagged;
                self.sentences_skipped += stored.sentences_skipped;
                self.graph.add(&stored.graph);
            }
        }
    }

    pub fn record_failure(&mut self, url: &str, error: &SiteGraphError) {
        self.resources_failed += 1;
        self.errors.push((url.to_string(), error.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each resource, successful or not. `processed` counts from 1.
    fn resource_done(&self, url: &str, outcome: Result<&IngestOutcome>, processed: usize);
    /// Called when the run completes.
    fn done(&self, summary: &IngestSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn resource_done(&self, _url: &str, _outcome: Result<&IngestOutcome>, _processed: usize) {}
    fn done(&self, _summary: &IngestSummary) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Ingest pipeline bound to one store and one tagger registry.
pub struct Pipeline {
    storage: Storage,
    taggers: TaggerRegistry,
    language: Option<String>,
}

impl Pipeline {
    pub fn new(storage: Storage, taggers: TaggerRegistry) -> Self {
        Self {
            storage,
            taggers,
            language: None,
        }
    }

    /// Use `language` for every HTML resource instead of its `<html lang>`.
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.map(|l| l.trim().to_ascii_lowercase());
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Crawl from `start_url` and ingest resources as they arrive.
    #[instrument(skip_all, fields(start_url = %start_url))]
    pub async fn crawl(
        &self,
        crawler: &Crawler,
        start_url: &Url,
        progress: &dyn ProgressReporter,
    ) -> Result<(CrawlResult, IngestSummary)> {
        let started = Instant::now();
        progress.phase("Crawling and ingesting");

        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        let ingest = async {
            let mut summary = IngestSummary::default();
            while let Some(fetched) = rx.recv().await {
                self.ingest_recorded(fetched, &mut summary, progress).await;
            }
            summary
        };

        let (crawl_result, mut summary) = tokio::join!(crawler.crawl(start_url, tx), ingest);
        let crawl_result = crawl_result?;
        summary.elapsed = started.elapsed();

        log_summary(&summary);
        progress.done(&summary);
        Ok((crawl_result, summary))
    }

    /// Ingest a batch of already fetched resources.
    pub async fn ingest_all(
        &self,
        resources: impl IntoIterator<Item = FetchedResource>,
        progress: &dyn ProgressReporter,
    ) -> IngestSummary {
        let started = Instant::now();
        progress.phase("Ingesting");

        let mut summary = IngestSummary::default();
        for fetched in resources {
            self.ingest_recorded(fetched, &mut summary, progress).await;
        }
        summary.elapsed = started.elapsed();

        log_summary(&summary);
        progress.done(&summary);
        summary
    }

    async fn ingest_recorded(
        &self,
        fetched: FetchedResource,
        summary: &mut IngestSummary,
        progress: &dyn ProgressReporter,
    ) {
        let url = fetched.origin_url.clone();
        match self.ingest(fetched).await {
            Ok(outcome) => {
                summary.record(&outcome);
                progress.resource_done(&url, Ok(&outcome), summary.processed());
            }
            Err(e) => {
                warn!(%url, error = %e, "ingest failed");
                summary.record_failure(&url, &e);
                progress.resource_done(&url, Err(e), summary.processed());
            }
        }
    }

    /// Ingest one fetched resource.
    #[instrument(skip_all, fields(url = %fetched.origin_url, kind = %fetched.resource_type))]
    pub async fn ingest(&self, fetched: FetchedResource) -> Result<IngestOutcome> {
        match fetched.resource_type {
            ResourceType::Html => self.ingest_html(fetched).await,
            ResourceType::Image | ResourceType::Document => self.ingest_binary(fetched).await,
        }
    }

    async fn ingest_html(&self, fetched: FetchedResource) -> Result<IngestOutcome> {
        let html = change::decode_text(&fetched.body)?;
        let normalized = normalize(html);
        if normalized.is_empty() {
            debug!("no usable content");
            return Ok(IngestOutcome::Empty);
        }

        let fingerprint = change::fingerprint(normalized.text.as_bytes());
        let status = self.gate(&fetched.origin_url, &fingerprint).await?;
        if status == ChangeStatus::Unchanged {
            return Ok(IngestOutcome::Unchanged);
        }

        let links = if fetched.links.is_empty() {
            Url::parse(&fetched.origin_url)
                .map(|url| same_host_links(html, &url))
                .unwrap_or_default()
        } else {
            fetched.links.clone()
        };
        let language = self.language.clone().or(normalized.language);

        let resource = Resource {
            id: ResourceId::new(),
            root_url: fetched.root_url,
            origin_url: fetched.origin_url,
            captured_at: fetched.fetched_at,
            resource_type: ResourceType::Html,
            outbound_links: links,
            title: normalized.title,
            meta_description: normalized.meta_description,
            meta_keywords: normalized.meta_keywords,
            raw: fetched.body,
            normalized_text: Some(normalized.text),
            fingerprint,
            language_code: language.clone(),
        };
        self.storage.insert_resource(&resource).await?;

        let text = resource.normalized_text.as_deref().unwrap_or_default();
        let stored = self
            .build_graph(resource.id.clone(), status, text, language.as_deref())
            .await?;

        info!(
            id = %stored.id,
            status = ?stored.status,
            sentences_tagged = stored.sentences_tagged,
            sentences_skipped = stored.sentences_skipped,
            nodes = stored.graph.nodes_upserted,
            relationships = stored.graph.relationships_created,
            "resource stored"
        );
        Ok(IngestOutcome::Stored(stored))
    }

    async fn ingest_binary(&self, fetched: FetchedResource) -> Result<IngestOutcome> {
        let fingerprint = change::fingerprint(&fetched.body);
        let status = self.gate(&fetched.origin_url, &fingerprint).await?;
        if status == ChangeStatus::Unchanged {
            return Ok(IngestOutcome::Unchanged);
        }

        let resource = Resource {
            id: ResourceId::new(),
            root_url: fetched.root_url,
            origin_url: fetched.origin_url,
            captured_at: fetched.fetched_at,
            resource_type: fetched.resource_type,
            outbound_links: Vec::new(),
            title: None,
            meta_description: None,
            meta_keywords: None,
            raw: fetched.body,
            normalized_text: None,
            fingerprint,
            language_code: None,
        };
        self.storage.insert_resource(&resource).await?;
        info!(id = %resource.id, bytes = resource.raw.len(), "binary resource stored");

        Ok(IngestOutcome::Stored(StoredResource {
            id: resource.id,
            resource_type: resource.resource_type,
            status,
            tagging: Tagging::NotText,
            sentences_tagged: 0,
            sentences_skipped: 0,
            graph: PersistReport::default(),
        }))
    }

    /// Compare `fingerprint` with the latest stored capture of `origin_url`.
    async fn gate(&self, origin_url: &str, fingerprint: &str) -> Result<ChangeStatus> {
        let latest = self.storage.find_latest(origin_url).await?;
        let status = change::classify(latest.as_ref().map(|r| r.fingerprint.as_str()), fingerprint);
        debug!(?status, "change gate");
        Ok(status)
    }

    /// Tag every sentence of `text`, merge the fragments, and persist once.
    async fn build_graph(
        &self,
        id: ResourceId,
        status: ChangeStatus,
        text: &str,
        language: Option<&str>,
    ) -> Result<StoredResource> {
        let mut stored = StoredResource {
            id,
            resource_type: ResourceType::Html,
            status,
            tagging: Tagging::UnknownLanguage,
            sentences_tagged: 0,
            sentences_skipped: 0,
            graph: PersistReport::default(),
        };

        let Some(language) = language else {
            debug!("no document language, tagging skipped");
            return Ok(stored);
        };
        if !self.taggers.supports(language) {
            info!(language, "unsupported language, tagging skipped");
            stored.tagging = Tagging::UnsupportedLanguage {
                language: language.to_string(),
            };
            return Ok(stored);
        }
        stored.tagging = Tagging::Performed {
            language: language.to_string(),
        };

        let mut fragment = GraphFragment::default();
        for sentence in sentences(text) {
            match self.extract_sentence(sentence, language).await {
                Ok(SentenceOutcome::Extracted(sentence_fragment)) => {
                    fragment.merge(sentence_fragment);
                    stored.sentences_tagged += 1;
                }
                Ok(SentenceOutcome::NoRelationships) => stored.sentences_tagged += 1,
                Ok(SentenceOutcome::UnsupportedLanguage) => stored.sentences_skipped += 1,
                Err(e) => {
                    warn!(sentence, error = %e, "tagging failed, sentence skipped");
                    stored.sentences_skipped += 1;
                }
            }
        }

        if !fragment.is_empty() {
            stored.graph = persist::upsert(&self.storage, &fragment).await?;
        }
        Ok(stored)
    }

    /// Tag one sentence and extract its fragment, without persisting.
    pub async fn extract_sentence(&self, sentence: &str, language: &str) -> Result<SentenceOutcome> {
        extract_sentence(&self.taggers, sentence, language).await
    }
}

/// Tag `sentence` with the registry's tagger for `language` and extract its fragment.
pub async fn extract_sentence(
    taggers: &TaggerRegistry,
    sentence: &str,
    language: &str,
) -> Result<SentenceOutcome> {
    let tokens = tokenize(sentence);
    if tokens.is_empty() {
        return Ok(SentenceOutcome::NoRelationships);
    }

    match taggers.tag(&tokens, language).await? {
        Tagged::UnsupportedLanguage => Ok(SentenceOutcome::UnsupportedLanguage),
        Tagged::Tokens(tagged) => Ok(match extract(&tagged) {
            Some(fragment) => SentenceOutcome::Extracted(fragment),
            None => SentenceOutcome::NoRelationships,
        }),
    }
}

fn log_summary(summary: &IngestSummary) {
    info!(
        new = summary.resources_new,
        changed = summary.resources_changed,
        unchanged = summary.resources_unchanged,
        empty = summary.resources_empty,
        failed = summary.resources_failed,
        sentences_tagged = summary.sentences_tagged,
        sentences_skipped = summary.sentences_skipped,
        nodes = summary.graph.nodes_upserted,
        relationships_created = summary.graph.relationships_created,
        elapsed_ms = summary.elapsed.as_millis(),
        "ingest complete"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use sitegraph_shared::{RELATES_TO, Token};
    use sitegraph_tagger::{RetryPolicy, Tagger};
    use uuid::Uuid;

    /// Tags from a fixed word list; unknown words get tag `X`.
    struct LexiconTagger {
        words: HashMap<&'static str, (&'static str, &'static str)>,
    }

    impl LexiconTagger {
        fn german() -> Self {
            let words = HashMap::from([
                ("Hund", ("Hund", "NOUN")),
                ("läuft", ("laufen", "VERB")),
                ("schnell", ("schnell", "ADV")),
                ("Park", ("Park", "NOUN")),
                ("Katze", ("Katze", "NOUN")),
                ("schwarze", ("schwarz", "ADJ")),
                ("schläft", ("schlafen", "VERB")),
                ("Garten", ("Garten", "NOUN")),
                ("Jugendamt", ("Jugendamt", "NOUN")),
                ("übernimmt", ("übernehmen", "VERB")),
                ("Vormundschaft", ("Vormundschaft", "NOUN")),
                ("Kind", ("Kind", "NOUN")),
                ("Stadt", ("Stadt", "NOUN")),
                ("berät", ("beraten", "VERB")),
                ("Familien", ("Familie", "NOUN")),
                ("kostenlos", ("kostenlos", "ADV")),
            ]);
            Self { words }
        }
    }

    #[async_trait]
    impl Tagger for LexiconTagger {
        async fn tag(&self, tokens: &[String], _language: &str) -> Result<Vec<Token>> {
            if tokens.iter().any(|t| t == "Störung") {
                return Err(SiteGraphError::validation("tagger rejected sentence"));
            }
            Ok(tokens
                .iter()
                .map(|t| match self.words.get(t.as_str()) {
                    Some((lemma, tag)) => Token::new(t, *lemma, *tag),
                    None => Token::new(t, t, "X"),
                })
                .collect())
        }

        fn name(&self) -> &str {
            "lexicon"
        }
    }

    async fn pipeline() -> Pipeline {
        let tmp = std::env::temp_dir().join(format!("sg_pipeline_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");

        let mut taggers = TaggerRegistry::new(RetryPolicy {
            max_attempts: 1,
            timeout: Duration::from_secs(1),
            initial_backoff: Duration::from_millis(1),
        });
        taggers.register("de", Arc::new(LexiconTagger::german()));
        Pipeline::new(storage, taggers)
    }

    const URL: &str = "https://www.beispielstadt.de/familie/tiere";

    fn page(body: &str) -> FetchedResource {
        FetchedResource::new(
            "https://www.beispielstadt.de/",
            URL,
            ResourceType::Html,
            body.as_bytes().to_vec(),
        )
    }

    fn stored(outcome: IngestOutcome) -> StoredResource {
        match outcome {
            IngestOutcome::Stored(stored) => stored,
            other => panic!("expected stored resource, got {other:?}"),
        }
    }

    const PAGE: &str = r#"<html lang="de"><body>
        <p>Der Hund läuft schnell zum Park.</p>
        <p>Die Katze schläft im Garten.</p>
    </body></html>"#;

    #[tokio::test]
    async fn first_ingest_stores_resource_and_graph() {
        let pipeline = pipeline().await;
        let result = stored(pipeline.ingest(page(PAGE)).await.unwrap());

        assert_eq!(result.status, ChangeStatus::New);
        assert_eq!(result.tagging, Tagging::Performed { language: "de".into() });
        assert_eq!(result.sentences_tagged, 2);
        assert_eq!(result.graph.nodes_upserted, 4);
        assert_eq!(result.graph.relationships_created, 2);

        let storage = pipeline.storage();
        let rels = storage.list_relationships().await.unwrap();
        assert_eq!(rels[0].rel_type, "laufen");
        assert_eq!(rels[0].properties, vec!["schnell"]);
        assert_eq!(rels[1].rel_type, "schlafen");

        let resource = storage.find_latest(URL).await.unwrap().unwrap();
        assert_eq!(resource.language_code.as_deref(), Some("de"));
        assert_eq!(
            resource.normalized_text.as_deref(),
            Some("Der Hund läuft schnell zum Park.\nDie Katze schläft im Garten.")
        );
        assert_eq!(resource.fingerprint, change::fingerprint(resource.normalized_text.unwrap().as_bytes()));
    }

    #[tokio::test]
    async fn unchanged_content_is_not_stored_again() {
        let pipeline = pipeline().await;
        pipeline.ingest(page(PAGE)).await.unwrap();

        // Markup-only change, same text.
        let reformatted = PAGE.replace("<p>", "<p class=\"neu\">");
        let outcome = pipeline.ingest(page(&reformatted)).await.unwrap();

        assert_eq!(outcome, IngestOutcome::Unchanged);
        assert_eq!(pipeline.storage().find_all(URL).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn changed_content_adds_capture() {
        let pipeline = pipeline().await;
        pipeline.ingest(page(PAGE)).await.unwrap();

        let changed = PAGE.replace("im Garten", "im Park");
        let result = stored(pipeline.ingest(page(&changed)).await.unwrap());

        assert_eq!(result.status, ChangeStatus::Changed);
        // Existing nodes are matched, not duplicated.
        assert_eq!(pipeline.storage().find_all(URL).await.unwrap().len(), 2);
        let labels: Vec<String> = pipeline
            .storage()
            .list_nodes()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.label)
            .collect();
        assert_eq!(labels, vec!["Garten", "Hund", "Katze", "Park"]);
    }

    #[tokio::test]
    async fn empty_page_is_skipped() {
        let pipeline = pipeline().await;
        let outcome = pipeline
            .ingest(page("<html><body><nav>Menü</nav><script>x()</script></body></html>"))
            .await
            .unwrap();

        assert_eq!(outcome, IngestOutcome::Empty);
        assert!(pipeline.storage().find_latest(URL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unsupported_language_stores_without_graph() {
        let pipeline = pipeline().await;
        let outcome = pipeline
            .ingest(page(r#"<html lang="fr"><body><p>Le chien court.</p></body></html>"#))
            .await
            .unwrap();

        let result = stored(outcome);
        assert_eq!(result.tagging, Tagging::UnsupportedLanguage { language: "fr".into() });
        assert_eq!(result.graph, PersistReport::default());
        assert!(pipeline.storage().find_latest(URL).await.unwrap().is_some());
        assert_eq!(pipeline.storage().graph_stats().await.unwrap().nodes, 0);
    }

    #[tokio::test]
    async fn language_override_wins() {
        let pipeline = pipeline().await.with_language(Some("DE".into()));
        let result = stored(
            pipeline
                .ingest(page("<html><body><p>Der Hund läuft zum Park.</p></body></html>"))
                .await
                .unwrap(),
        );
        assert_eq!(result.tagging, Tagging::Performed { language: "de".into() });
        assert_eq!(result.graph.relationships_created, 1);
    }

    #[tokio::test]
    async fn tagging_failure_skips_only_that_sentence() {
        let pipeline = pipeline().await;
        let body = r#"<html lang="de"><body>
            <p>Eine Störung im Hund Park.</p>
            <p>Die Katze schläft im Garten.</p>
        </body></html>"#;

        let result = stored(pipeline.ingest(page(body)).await.unwrap());
        assert_eq!(result.sentences_skipped, 1);
        assert_eq!(result.sentences_tagged, 1);
        assert!(pipeline.storage().get_node("Katze").await.unwrap().is_some());
        assert!(pipeline.storage().get_node("Hund").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_decode_error() {
        let pipeline = pipeline().await;
        let fetched = FetchedResource::new(URL, URL, ResourceType::Html, vec![0x3c, 0x70, 0xff, 0xfe]);

        let err = pipeline.ingest(fetched.clone()).await.unwrap_err();
        assert!(matches!(err, SiteGraphError::Decode { .. }));

        let summary = pipeline.ingest_all([fetched], &SilentProgress).await;
        assert_eq!(summary.resources_failed, 1);
        assert_eq!(summary.errors[0].0, URL);
    }

    #[tokio::test]
    async fn binaries_are_stored_untagged() {
        let pipeline = pipeline().await;
        let bytes = vec![0x25, 0x50, 0x44, 0x46, 0xff];
        let pdf = FetchedResource::new(
            URL,
            "https://www.beispielstadt.de/merkblatt.pdf",
            ResourceType::Document,
            bytes.clone(),
        );

        let result = stored(pipeline.ingest(pdf.clone()).await.unwrap());
        assert_eq!(result.tagging, Tagging::NotText);
        assert_eq!(result.resource_type, ResourceType::Document);

        let resource = pipeline
            .storage()
            .find_latest("https://www.beispielstadt.de/merkblatt.pdf")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resource.fingerprint, change::fingerprint(&bytes));
        assert!(resource.normalized_text.is_none());

        assert_eq!(pipeline.ingest(pdf).await.unwrap(), IngestOutcome::Unchanged);
    }

    #[tokio::test]
    async fn municipal_fixture_builds_graph() {
        let html = std::fs::read(
            std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../../../fixtures/html/municipal.html"),
        )
        .expect("fixture");
        let origin = "https://www.beispielstadt.de/familie/vormundschaften";
        let pipeline = pipeline().await;

        let summary = pipeline
            .ingest_all(
                [FetchedResource::new(origin, origin, ResourceType::Html, html)],
                &SilentProgress,
            )
            .await;
        assert_eq!(summary.resources_new, 1);

        let rels = pipeline.storage().list_relationships().await.unwrap();
        let typed: Vec<(&str, &str, &str)> = rels
            .iter()
            .map(|r| (r.from.as_str(), r.rel_type.as_str(), r.to.as_str()))
            .collect();
        assert!(typed.contains(&("Jugendamt", "übernehmen", "Vormundschaft")));
        assert!(typed.contains(&("Vormundschaft", RELATES_TO, "Kind")));
        assert!(typed.contains(&("Stadt", "beraten", "Familie")));

        let resource = pipeline.storage().find_latest(origin).await.unwrap().unwrap();
        assert_eq!(resource.title.as_deref(), Some("Vormundschaften - Stadt Beispielstadt"));
        assert!(resource
            .outbound_links
            .contains(&"https://www.beispielstadt.de/dokumente/merkblatt.pdf".to_string()));
    }

    #[tokio::test]
    async fn extract_sentence_reports_unsupported_language() {
        let pipeline = pipeline().await;
        let outcome = pipeline.extract_sentence("Le chien court.", "fr").await.unwrap();
        assert_eq!(outcome, SentenceOutcome::UnsupportedLanguage);

        let outcome = pipeline.extract_sentence("Die Katze schläft.", "de").await.unwrap();
        assert_eq!(outcome, SentenceOutcome::NoRelationships);
    }

    #[tokio::test]
    async fn crawl_ingests_fetched_pages() {
        use sitegraph_shared::CrawlConfig;
        use wiremock::matchers::path;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    r#"<html lang="de"><body><p>Der Hund läuft zum Park.</p><a href="/katze">Katze</a></body></html>"#,
                    "text/html; charset=utf-8",
                ),
            )
            .mount(&server)
            .await;
        Mock::given(path("/katze"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    r#"<html lang="de"><body><p>Die Katze schläft im Garten.</p></body></html>"#,
                    "text/html; charset=utf-8",
                ),
            )
            .mount(&server)
            .await;

        let config = CrawlConfig {
            depth: 0,
            concurrency: 2,
            rate_limit_ms: 0,
            max_pages: 0,
            fetch_binaries: false,
            include_patterns: vec![],
            exclude_patterns: vec![],
        };
        let crawler = Crawler::new(config).unwrap().allow_localhost();
        let start = Url::parse(&server.uri()).unwrap();
        let pipeline = pipeline().await;

        let (crawl, summary) = pipeline.crawl(&crawler, &start, &SilentProgress).await.unwrap();
        assert_eq!(crawl.resources_fetched, 2);
        assert_eq!(summary.resources_new, 2);
        assert_eq!(summary.graph.relationships_created, 2);
        assert_eq!(pipeline.storage().resource_count().await.unwrap(), 2);

        // Second crawl finds nothing new.
        let (_, again) = pipeline.crawl(&crawler, &start, &SilentProgress).await.unwrap();
        assert_eq!(again.resources_unchanged, 2);
        assert_eq!(again.resources_new, 0);
    }
}
