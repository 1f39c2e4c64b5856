//! Replacing the contents of target blocks with highlighted markup.

use super::{is_target, locate, Block};
use crate::error::HighlightError;
use crate::highlight::{Highlighter, BLOCK_CLASS};
use regex::Regex;
use std::sync::LazyLock;

static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\bclass\s*=\s*["'])([^"']*)(["'])"#).expect("class regex is valid")
});

/// The outcome of rewriting one document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Rewrite {
    /// The new document text, if any block changed.
    pub text: Option<String>,
    /// Blocks which were highlighted.
    pub highlighted: usize,
    /// Target blocks left alone because they were already highlighted.
    pub skipped: usize,
}

/// Highlight a single block, returning its replacement text.
///
/// The block's language is used when it has one, falling back to `python`.
pub fn rewrite_block(
    block: &Block<'_>,
    highlighter: &dyn Highlighter,
    style: &str,
) -> Result<String, HighlightError> {
    let source = html_escape::decode_html_entities(block.inner);
    let language = block.language().unwrap_or("python");
    let markup = highlighter.highlight(&source, language, style)?;

    let mut out = String::with_capacity(
        block.pre_open.len() + block.code_open.len() + markup.len() + 32,
    );
    out.push_str(&add_class(block.pre_open, BLOCK_CLASS));
    out.push_str(block.code_open);
    out.push_str(&markup);
    out.push_str(block.code_close);
    out.push_str(block.pre_close);
    Ok(out)
}

/// Highlight every target block in `text` which hasn't been highlighted already.
///
/// Either every target block is rewritten or, on the first highlighter failure, the
/// error is returned and nothing is.
pub fn rewrite_document(
    text: &str,
    highlighter: &dyn Highlighter,
    style: &str,
) -> Result<Rewrite, HighlightError> {
    let mut rewrite = Rewrite::default();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for block in locate(text) {
        if !is_target(block.pre_open, block.code_open) {
            continue;
        }
        if block.is_highlighted() {
            rewrite.skipped += 1;
            continue;
        }

        let replacement = rewrite_block(&block, highlighter, style)?;
        out.push_str(&text[last..block.range.start]);
        out.push_str(&replacement);
        last = block.range.end;
        rewrite.highlighted += 1;
    }

    if rewrite.highlighted > 0 {
        out.push_str(&text[last..]);
        if out != text {
            rewrite.text = Some(out);
        }
    }
    Ok(rewrite)
}

/// Add `class_name` to the `class` attribute of an opening tag, creating the attribute
/// if the tag doesn't have one.
pub fn add_class(tag_open: &str, class_name: &str) -> String {
    if CLASS_ATTR_RE.is_match(tag_open) {
        return CLASS_ATTR_RE
            .replacen(tag_open, 1, |caps: &regex::Captures| {
                let classes = format!("{} {}", &caps[2], class_name);
                format!("{}{}{}", &caps[1], classes.trim(), &caps[3])
            })
            .into_owned();
    }

    let (head, close) = match tag_open.strip_suffix("/>") {
        Some(head) => (head, "/>"),
        None => (tag_open.strip_suffix('>').unwrap_or(tag_open), ">"),
    };
    format!(r#"{} class="{}"{}"#, head.trim_end(), class_name, close)
}
