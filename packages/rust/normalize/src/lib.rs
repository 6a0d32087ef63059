//! HTML-to-plain-text normalization.
//!
//! Strips non-content markup from a raw page, unwraps inline elements, and
//! emits the remaining text one block per line. Also pulls the page metadata
//! stored alongside each resource (title, meta description/keywords, language).

mod elements;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use elements::{ElementKind, classify};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of normalizing one HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    /// Plain text, one block per line. Empty when nothing usable remains.
    pub text: String,
    /// `<title>`, falling back to the first `<h1>`.
    pub title: Option<String>,
    /// `<meta name="description">` content.
    pub meta_description: Option<String>,
    /// `<meta name="keywords">` content.
    pub meta_keywords: Option<String>,
    /// Primary language subtag of `<html lang>`, lowercased.
    pub language: Option<String>,
}

impl Normalized {
    /// `true` when the document has no textual content; callers skip it.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Normalize a raw HTML document into plain text plus metadata.
#[instrument(skip_all, fields(html_len = html.len()))]
pub fn normalize(html: &str) -> Normalized {
    let doc = Html::parse_document(html);

    let text = normalize_text(&doc);
    let normalized = Normalized {
        text,
        title: extract_title(&doc),
        meta_description: extract_meta(&doc, &META_DESCRIPTION),
        meta_keywords: extract_meta(&doc, &META_KEYWORDS),
        language: extract_language(&doc),
    };

    debug!(
        lines = normalized.text.lines().count(),
        language = normalized.language.as_deref().unwrap_or("-"),
        "normalization complete"
    );

    normalized
}

/// Split normalized text into sentences (one per non-empty line).
pub fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

fn normalize_text(doc: &Html) -> String {
    let mut out = BlockWriter::default();
    walk(doc.root_element(), &mut out);
    out.finish()
}

/// Accumulates text of the block being walked and the finished lines.
#[derive(Default)]
struct BlockWriter {
    lines: Vec<String>,
    current: String,
}

impl BlockWriter {
    fn push_text(&mut self, text: &str) {
        self.current.push_str(text);
    }

    /// Close the current block, keeping it only if it has visible text.
    fn break_block(&mut self) {
        let line = collapse_whitespace(&self.current);
        if !line.is_empty() {
            self.lines.push(line);
        }
        self.current.clear();
    }

    fn finish(mut self) -> String {
        self.break_block();
        self.lines.join("\n")
    }
}

fn walk(parent: ElementRef<'_>, out: &mut BlockWriter) {
    for child in parent.children() {
        if let Some(text) = child.value().as_text() {
            out.push_text(text);
            continue;
        }

        let Some(element) = ElementRef::wrap(child) else {
            continue;
        };

        match classify(element.value().name()) {
            ElementKind::Removed => {}
            ElementKind::Inline => walk(element, out),
            ElementKind::LineBreak => out.break_block(),
            ElementKind::Block => {
                out.break_block();
                walk(element, out);
                out.break_block();
            }
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("head title").expect("valid selector"));
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static META_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="description" i]"#).expect("valid selector")
});
static META_KEYWORDS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="keywords" i]"#).expect("valid selector"));

fn extract_title(doc: &Html) -> Option<String> {
    [&*TITLE, &*H1].into_iter().find_map(|sel| {
        doc.select(sel)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|t| !t.is_empty())
    })
}

fn extract_meta(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|c| !c.is_empty())
}

fn extract_language(doc: &Html) -> Option<String> {
    let lang = doc.root_element().value().attr("lang")?;
    let primary = lang.trim().split(['-', '_']).next()?.to_ascii_lowercase();
    (!primary.is_empty()).then_some(primary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
