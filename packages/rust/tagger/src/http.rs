//! HTTP client for an external tagging service.
//!
//! Protocol: `POST {endpoint}/tag` with `{"tokens": [...], "lang": "de"}`,
//! answered by `{"tokens": [{"text": .., "lemma": .., "tag": ..}, ...]}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use sitegraph_shared::{Result, SiteGraphError, Token};

use crate::Tagger;

/// User-Agent string for tagging requests.
const USER_AGENT: &str = concat!("sitegraph/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct TagRequest<'a> {
    tokens: &'a [String],
    lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    tokens: Vec<TaggedWord>,
}

#[derive(Debug, Deserialize)]
struct TaggedWord {
    text: String,
    #[serde(default)]
    lemma: String,
    tag: String,
}

/// Tagger backed by a remote HTTP service.
#[derive(Debug, Clone)]
pub struct HttpTagger {
    client: Client,
    tag_url: Url,
}

impl HttpTagger {
    /// Create a client for the service at `endpoint`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(endpoint).map_err(|e| {
            SiteGraphError::config(format!("invalid tagger endpoint '{endpoint}': {e}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let tag_url = base
            .join("tag")
            .map_err(|e| SiteGraphError::config(format!("invalid tagger endpoint: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SiteGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, tag_url })
    }

    /// Full URL requests are posted to.
    pub fn tag_url(&self) -> &Url {
        &self.tag_url
    }
}

#[async_trait]
impl Tagger for HttpTagger {
    async fn tag(&self, tokens: &[String], language: &str) -> Result<Vec<Token>> {
        debug!(url = %self.tag_url, language, tokens = tokens.len(), "tagging sentence");

        let response = self
            .client
            .post(self.tag_url.clone())
            .json(&TagRequest {
                tokens,
                lang: language,
            })
            .send()
            .await
            .map_err(|e| SiteGraphError::Tagging(format!("{}: {e}", self.tag_url)))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SiteGraphError::Tagging(format!(
                "{}: HTTP {status}",
                self.tag_url
            )));
        }
        if !status.is_success() {
            return Err(SiteGraphError::validation(format!(
                "tagger rejected request: HTTP {status}"
            )));
        }

        let body: TagResponse = response
            .json()
            .await
            .map_err(|e| SiteGraphError::parse(format!("invalid tagger response: {e}")))?;

        Ok(body
            .tokens
            .into_iter()
            .map(|w| {
                let lemma = if w.lemma.is_empty() {
                    w.text.clone()
                } else {
                    w.lemma
                };
                Token::new(w.text, lemma, w.tag)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegraph_shared::TagClass;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn tag_url_respects_base_path() {
        let tagger = HttpTagger::new("http://tagger.local:9000/api", Duration::from_secs(1)).unwrap();
        assert_eq!(tagger.tag_url().as_str(), "http://tagger.local:9000/api/tag");

        let tagger = HttpTagger::new("http://tagger.local:9000", Duration::from_secs(1)).unwrap();
        assert_eq!(tagger.tag_url().as_str(), "http://tagger.local:9000/tag");
    }

    #[test]
    fn invalid_endpoint_is_config_error() {
        let err = HttpTagger::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SiteGraphError::Config { .. }));
    }

    #[tokio::test]
    async fn tags_via_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tag"))
            .and(body_json(serde_json::json!({
                "tokens": ["Der", "Hund", "läuft"],
                "lang": "de"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tokens": [
                    {"text": "Der", "lemma": "der", "tag": "DET"},
                    {"text": "Hund", "lemma": "Hund", "tag": "NOUN"},
                    {"text": "läuft", "lemma": "laufen", "tag": "VERB"}
                ]
            })))
            .mount(&server)
            .await;

        let tagger = HttpTagger::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let tokens = tagger.tag(&words("Der Hund läuft"), "de").await.unwrap();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].lemma, "Hund");
        assert_eq!(tokens[1].class, TagClass::Noun);
        assert_eq!(tokens[2].lemma, "laufen");
        assert_eq!(tokens[2].class, TagClass::Verb);
        assert_eq!(tokens[0].class, TagClass::Other);
    }

    #[tokio::test]
    async fn missing_lemma_falls_back_to_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tokens": [{"text": "Park", "tag": "NOUN"}]
            })))
            .mount(&server)
            .await;

        let tagger = HttpTagger::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let tokens = tagger.tag(&words("Park"), "de").await.unwrap();
        assert_eq!(tokens[0].lemma, "Park");
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let tagger = HttpTagger::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = tagger.tag(&words("Hund"), "de").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn client_errors_are_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let tagger = HttpTagger::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = tagger.tag(&words("Hund"), "de").await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let tagger = HttpTagger::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = tagger.tag(&words("Hund"), "de").await.unwrap_err();
        assert!(matches!(err, SiteGraphError::Parse { .. }));
    }
}
