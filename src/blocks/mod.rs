//! Finding `<pre><code>` blocks in EPUB markup.
//!
//! EPUB content is XHTML in theory and tag soup in practice, so blocks are located with
//! regular expressions rather than a parser. A block is a `<pre>` immediately wrapping a
//! `<code>` (whitespace allowed between the tags); its language is taken from hints in
//! the attributes of either tag, e.g.
//!
//! ```html
//! <pre><code class="language-python">print(1)</code></pre>
//! <pre class="python"><code>print(1)</code></pre>
//! <pre><code data-lang="Python">print(1)</code></pre>
//! ```

mod rewrite;
pub use rewrite::*;

use crate::highlight::BLOCK_CLASS;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)(?P<pre_open><pre\b[^>]*>)\s*(?P<code_open><code\b[^>]*>)(?P<inner>.*?)(?P<code_close></code>)\s*(?P<pre_close></pre>)",
    )
    .expect("block regex is valid")
});

/// Markup left behind by a previous highlighting pass: a span carrying a class.
static HIGHLIGHTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<span\b[^>]*\bclass\s*=").expect("span regex is valid"));

/// A `<pre>` already marked as highlighted, whatever its contents turned out to be.
static MARKED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)\bclass\s*=\s*["'](?:[^"']*\s)?{}(?:\s[^"']*)?["']"#,
        regex::escape(BLOCK_CLASS)
    ))
    .expect("marker regex is valid")
});

/// The languages we highlight, and how each is recognised.
pub static LANGUAGE_HINTS: LazyLock<Vec<LanguageHint>> =
    LazyLock::new(|| vec![LanguageHint::new("python")]);

/// Attribute patterns which mark a block as being written in `language`.
#[derive(Debug)]
pub struct LanguageHint {
    pub language: &'static str,
    pattern: Regex,
}

impl LanguageHint {
    /// Recognises `class="language-<lang>"`, a bare `<lang>` class token,
    /// `data-language="<lang>"` and `data-lang="<lang>"`, ignoring case.
    pub fn new(language: &'static str) -> LanguageHint {
        let lang = regex::escape(language);
        let pattern = format!(
            r#"(?i)class\s*=\s*["'][^"']*\b(?:language-{lang}|{lang})\b[^"']*["']|data-lang(?:uage)?\s*=\s*["']{lang}["']"#
        );
        LanguageHint {
            language,
            pattern: Regex::new(&pattern).expect("language hint regex is valid"),
        }
    }

    pub fn matches(&self, tag: &str) -> bool {
        self.pattern.is_match(tag)
    }
}

/// A `<pre><code>...</code></pre>` region of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'t> {
    pub pre_open: &'t str,
    pub code_open: &'t str,
    pub inner: &'t str,
    pub code_close: &'t str,
    pub pre_close: &'t str,
    /// Byte range of the whole block within the document.
    pub range: Range<usize>,
}

impl<'t> Block<'t> {
    /// The language hinted at by the block's tags, if it is one we highlight.
    pub fn language(&self) -> Option<&'static str> {
        language_of(self.pre_open, self.code_open)
    }

    /// Whether the block already carries highlighting markup, or a `<pre>` marked by
    /// a previous pass (an empty block highlights to nothing, leaving only the mark).
    pub fn is_highlighted(&self) -> bool {
        HIGHLIGHTED_RE.is_match(self.inner) || MARKED_RE.is_match(self.pre_open)
    }
}

/// Lazily find every block in `text`, in document order.
pub fn locate(text: &str) -> impl Iterator<Item = Block<'_>> {
    BLOCK_RE.captures_iter(text).map(|caps| {
        // every group is mandatory, so they're all present on a match
        let group = |name: &str| caps.name(name).map(|m| m.as_str()).unwrap_or_default();
        let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
        Block {
            pre_open: group("pre_open"),
            code_open: group("code_open"),
            inner: group("inner"),
            code_close: group("code_close"),
            pre_close: group("pre_close"),
            range: whole,
        }
    })
}

/// The first hinted language found on either opening tag.
pub fn language_of(pre_open: &str, code_open: &str) -> Option<&'static str> {
    LANGUAGE_HINTS
        .iter()
        .find(|hint| hint.matches(pre_open) || hint.matches(code_open))
        .map(|hint| hint.language)
}

/// Whether a block with these opening tags should be highlighted.
pub fn is_target(pre_open: &str, code_open: &str) -> bool {
    language_of(pre_open, code_open).is_some()
}
