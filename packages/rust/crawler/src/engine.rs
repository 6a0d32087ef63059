//! Concurrent, scope-aware web crawler engine.
//!
//! The crawler starts from a given URL, performs BFS traversal over pages on
//! the start URL's host, respects depth/concurrency/rate/page limits, and
//! hands every fetched resource (pages, plus linked images and PDFs when
//! enabled) to a channel for ingestion.

use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use sitegraph_shared::{CrawlConfig, ResourceType, Result, SiteGraphError};

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("sitegraph/", env!("CARGO_PKG_VERSION"));

static LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static IMAGES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("valid selector"));

// ---------------------------------------------------------------------------
// CrawlResult
// ---------------------------------------------------------------------------

/// Summary of a completed crawl operation.
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    /// Number of resources fetched and handed to the sink.
    pub resources_fetched: usize,
    /// Number of URLs skipped (out of scope, dedup, unsupported content).
    pub resources_skipped: usize,
    /// Errors encountered (URL, error message).
    pub errors: Vec<(String, String)>,
    /// Total duration of the crawl.
    pub duration: Duration,
}

/// A fetched page or binary, not yet normalized or stored.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// URL the crawl started from.
    pub root_url: String,
    /// URL this resource was fetched from.
    pub origin_url: String,
    pub resource_type: ResourceType,
    /// Raw response body.
    pub body: Vec<u8>,
    /// Same-host links found on the page (empty for binaries).
    pub links: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedResource {
    /// A resource obtained outside a crawl (e.g. read from disk).
    pub fn new(
        root_url: impl Into<String>,
        origin_url: impl Into<String>,
        resource_type: ResourceType,
        body: Vec<u8>,
    ) -> Self {
        Self {
            root_url: root_url.into(),
            origin_url: origin_url.into(),
            resource_type,
            body,
            links: Vec::new(),
            fetched_at: Utc::now(),
        }
    }
}

/// A URL waiting to be fetched.
#[derive(Debug, Clone)]
struct Pending {
    url: Url,
    depth: u32,
    kind: ResourceType,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Concurrent web crawler with scope-aware fetching.
pub struct Crawler {
    config: CrawlConfig,
    client: Client,
    /// Allow localhost/private IPs (intranet sites, mock servers).
    allow_localhost: bool,
}

impl Crawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SiteGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            allow_localhost: false,
        })
    }

    /// Allow crawling localhost/private IPs.
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Crawl starting from `start_url`, sending each fetched resource to `sink`.
    ///
    /// Stops early when the receiving side of `sink` is dropped.
    #[instrument(skip_all, fields(start_url = %start_url))]
    pub async fn crawl(
        &self,
        start_url: &Url,
        sink: mpsc::Sender<FetchedResource>,
    ) -> Result<CrawlResult> {
        let start_time = std::time::Instant::now();

        let scope = CrawlScope::new(start_url, &self.config)?;
        let root_url = start_url.to_string();
        let concurrency = self.config.concurrency.max(1) as usize;

        let mut visited = HashSet::<String>::new();
        let mut queue = VecDeque::from([Pending {
            url: start_url.clone(),
            depth: 0,
            kind: ResourceType::Html,
        }]);
        let mut result = CrawlResult::default();

        info!(
            depth = self.config.depth,
            concurrency,
            rate_limit_ms = self.config.rate_limit_ms,
            max_pages = self.config.max_pages,
            fetch_binaries = self.config.fetch_binaries,
            "starting crawl"
        );

        'crawl: while !queue.is_empty() {
            let mut handles = Vec::new();

            while handles.len() < concurrency {
                let Some(item) = queue.pop_front() else {
                    break;
                };

                if self.config.max_pages > 0
                    && result.resources_fetched + handles.len() >= self.config.max_pages
                {
                    info!(max_pages = self.config.max_pages, "page limit reached");
                    queue.clear();
                    break;
                }

                if !visited.insert(normalize_url(&item.url)) {
                    result.resources_skipped += 1;
                    continue;
                }

                if !scope.in_scope(&item.url) {
                    debug!(url = %item.url, "out of scope, skipping");
                    result.resources_skipped += 1;
                    continue;
                }

                if !self.allow_localhost && is_ssrf_target(&item.url) {
                    warn!(url = %item.url, "SSRF protection: blocked");
                    result.resources_skipped += 1;
                    continue;
                }

                let client = self.client.clone();
                let rate_limit = self.config.rate_limit_ms;

                handles.push(tokio::spawn(async move {
                    // Rate limiting
                    if rate_limit > 0 {
                        tokio::time::sleep(Duration::from_millis(rate_limit)).await;
                    }
                    let outcome = fetch(&client, &item.url, item.kind).await;
                    (item, outcome)
                }));
            }

            for handle in handles {
                let (item, outcome) = match handle.await {
                    Ok(done) => done,
                    Err(e) => {
                        result.errors.push(("task".into(), e.to_string()));
                        continue;
                    }
                };

                let (resource_type, body) = match outcome {
                    Ok(Some(fetched)) => fetched,
                    Ok(None) => {
                        result.resources_skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!(url = %item.url, error = %e, "fetch failed");
                        result.errors.push((item.url.to_string(), e.to_string()));
                        continue;
                    }
                };

                if resource_type != ResourceType::Html && !self.config.fetch_binaries {
                    result.resources_skipped += 1;
                    continue;
                }

                let mut links = Vec::new();
                if resource_type == ResourceType::Html {
                    let doc = Html::parse_document(&String::from_utf8_lossy(&body));
                    links = outbound_links(&doc, &item.url, &scope);

                    let may_descend = self.config.depth == 0 || item.depth < self.config.depth;
                    if may_descend {
                        self.enqueue_children(&doc, &item, &links, &scope, &mut queue);
                    }
                }

                let resource = FetchedResource {
                    root_url: root_url.clone(),
                    origin_url: item.url.to_string(),
                    resource_type,
                    body,
                    links,
                    fetched_at: Utc::now(),
                };

                result.resources_fetched += 1;
                if sink.send(resource).await.is_err() {
                    warn!("resource receiver closed, stopping crawl");
                    break 'crawl;
                }
            }
        }

        result.duration = start_time.elapsed();

        info!(
            resources_fetched = result.resources_fetched,
            resources_skipped = result.resources_skipped,
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis(),
            "crawl completed"
        );

        Ok(result)
    }

    /// Queue the page links and, when enabled, linked images and PDFs.
    fn enqueue_children(
        &self,
        doc: &Html,
        parent: &Pending,
        links: &[String],
        scope: &CrawlScope,
        queue: &mut VecDeque<Pending>,
    ) {
        let depth = parent.depth + 1;

        for link in links {
            let Ok(url) = Url::parse(link) else {
                continue;
            };
            let kind = if is_pdf(&url) {
                if !self.config.fetch_binaries {
                    continue;
                }
                ResourceType::Document
            } else {
                ResourceType::Html
            };
            queue.push_back(Pending { url, depth, kind });
        }

        if self.config.fetch_binaries {
            for src in doc.select(&IMAGES).filter_map(|el| el.value().attr("src")) {
                let Ok(url) = parent.url.join(src) else {
                    continue;
                };
                if scope.same_host(&url) {
                    queue.push_back(Pending {
                        url,
                        depth,
                        kind: ResourceType::Image,
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scope checking
// ---------------------------------------------------------------------------

/// Determines which URLs are "in scope" for a crawl.
struct CrawlScope {
    /// Base host that URLs must match.
    base_host: String,
    /// Include patterns (if non-empty, URL must match at least one).
    include_patterns: Vec<regex::Regex>,
    /// Exclude patterns (if URL matches any, it's excluded).
    exclude_patterns: Vec<regex::Regex>,
}

impl CrawlScope {
    /// Scope covering every http(s) URL on `start_url`'s host.
    fn host_of(start_url: &Url) -> Result<Self> {
        let base_host = start_url
            .host_str()
            .ok_or_else(|| SiteGraphError::validation(format!("start URL has no host: {start_url}")))?
            .to_ascii_lowercase();

        Ok(Self {
            base_host,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        })
    }

    fn new(start_url: &Url, config: &CrawlConfig) -> Result<Self> {
        let mut scope = Self::host_of(start_url)?;

        scope.include_patterns = config
            .include_patterns
            .iter()
            .filter_map(|p| glob_to_regex(p))
            .collect();

        scope.exclude_patterns = config
            .exclude_patterns
            .iter()
            .filter_map(|p| glob_to_regex(p))
            .collect();

        Ok(scope)
    }

    /// http(s) URL on the start URL's host.
    fn same_host(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && url
                .host_str()
                .is_some_and(|h| h.eq_ignore_ascii_case(&self.base_host))
    }

    fn in_scope(&self, url: &Url) -> bool {
        if !self.same_host(url) {
            return false;
        }

        let path = url.path();

        // Check exclude patterns
        if self.exclude_patterns.iter().any(|p| p.is_match(path)) {
            return false;
        }

        // Check include patterns (if any configured, must match at least one)
        self.include_patterns.is_empty() || self.include_patterns.iter().any(|p| p.is_match(path))
    }
}

/// Convert a glob-like pattern to a regex.
fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    regex::Regex::new(&format!("^{escaped}$")).ok()
}

fn is_pdf(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    // Block private/loopback IPs
    if let Some(host) = url.host_str() {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        // Block known local hostnames
        if host == "localhost" || host.ends_with(".local") || host.ends_with(".internal") {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Fetch a single URL. `Ok(None)` means the content type is not one we store.
async fn fetch(
    client: &Client,
    url: &Url,
    expected: ResourceType,
) -> Result<Option<(ResourceType, Vec<u8>)>> {
    debug!(%url, kind = %expected, "fetching");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| SiteGraphError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SiteGraphError::Network(format!("{url}: HTTP {status}")));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);

    let resource_type = match expected {
        ResourceType::Html => match classify_content_type(content_type.as_deref()) {
            Some(kind) => kind,
            None => {
                debug!(%url, content_type = ?content_type, "unsupported content type");
                return Ok(None);
            }
        },
        binary => binary,
    };

    let body = response
        .bytes()
        .await
        .map_err(|e| SiteGraphError::Network(format!("{url}: body read failed: {e}")))?;

    Ok(Some((resource_type, body.to_vec())))
}

/// Map a Content-Type header to a resource type. A missing header counts as HTML.
fn classify_content_type(content_type: Option<&str>) -> Option<ResourceType> {
    let Some(ct) = content_type else {
        return Some(ResourceType::Html);
    };
    let mime = ct.split(';').next().unwrap_or("").trim();
    match mime {
        "text/html" | "application/xhtml+xml" | "" => Some(ResourceType::Html),
        "application/pdf" => Some(ResourceType::Document),
        m if m.starts_with("image/") => Some(ResourceType::Image),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Link extraction
// ---------------------------------------------------------------------------

/// Same-host links of an HTML page at `page_url`, resolved and deduplicated.
pub fn same_host_links(html: &str, page_url: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    match CrawlScope::host_of(page_url) {
        Ok(scope) => outbound_links(&doc, page_url, &scope),
        Err(_) => Vec::new(),
    }
}

fn outbound_links(doc: &Html, page_url: &Url, scope: &CrawlScope) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_links(doc, page_url)
        .into_iter()
        .filter(|link| Url::parse(link).is_ok_and(|u| scope.same_host(&u)))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Extract all links from a document, resolved against the base URL.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    for href in doc.select(&LINKS).filter_map(|el| el.value().attr("href")) {
        let href = href.trim();
        // Skip anchors, javascript:, mailto:, tel:
        if href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        // Resolve relative URLs
        if let Ok(mut resolved) = base_url.join(href) {
            resolved.set_fragment(None);
            links.push(resolved.to_string());
        }
    }

    links
}

/// Normalize a URL for deduplication (strip fragment and trailing slash).
fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    // Remove trailing slash for consistency (except root path)
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}
