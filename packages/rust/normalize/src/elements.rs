//! Element classification for the text walk.
//!
//! Every element name falls into exactly one [`ElementKind`]. Anything not
//! listed is treated as a block container.

/// How the normalizer treats an element and its subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementKind {
    /// Dropped together with all descendants.
    Removed,
    /// Unwrapped: its text flows into the enclosing block.
    Inline,
    /// Ends the current line without opening a container.
    LineBreak,
    /// Starts and ends its own block.
    Block,
}

/// Metadata, media, embedded/scripting, form and interactive elements,
/// deprecated/vector/math markup, and layout chrome.
const REMOVED: &[&str] = &[
    // metadata
    "head", "title", "meta", "link", "base", "style",
    // scripting / embedded
    "script", "noscript", "template", "iframe", "embed", "object", "param", "canvas",
    // media
    "img", "picture", "video", "audio", "source", "track", "map", "area",
    // forms / interactive
    "form", "input", "button", "select", "option", "optgroup", "textarea", "datalist",
    "output", "label", "fieldset", "legend", "meter", "progress", "dialog", "menu",
    "slot",
    // deprecated
    "applet", "basefont", "bgsound", "frame", "frameset", "noframes", "marquee", "blink",
    "isindex", "keygen",
    // vector / math
    "svg", "math",
    // layout chrome
    "nav", "header", "footer", "aside",
];

/// Purely presentational or phrasing elements.
const INLINE: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "big", "cite", "code", "data", "del", "dfn", "em", "font",
    "i", "ins", "kbd", "mark", "q", "rp", "rt", "ruby", "s", "samp", "small", "span", "strike",
    "strong", "sub", "sup", "time", "tt", "u", "var", "wbr",
];

pub(crate) fn classify(name: &str) -> ElementKind {
    // Custom elements (web components) always carry a hyphen.
    if name.contains('-') || REMOVED.contains(&name) {
        ElementKind::Removed
    } else if INLINE.contains(&name) {
        ElementKind::Inline
    } else if name == "br" || name == "hr" {
        ElementKind::LineBreak
    } else {
        ElementKind::Block
    }
}
