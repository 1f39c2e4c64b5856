//! Getting the highlighting CSS into the book.
//!
//! Rules are appended to one stylesheet per run: `style.css` if the book has one,
//! otherwise the first stylesheet found, otherwise a new file. Appended rules start with
//! a guard comment; a stylesheet which already contains it is left alone, so running
//! over the same book twice doesn't duplicate anything.
//!
//! A new stylesheet isn't referenced by any document yet, so the caller links it into
//! each document's `<head>` with [`link_stylesheet`].

use crate::archive::walk_files;
use crate::highlight::BLOCK_CLASS;
use log::{debug, warn};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Marks rules appended by this tool.
pub const GUARD: &str = "/* EPUB_HIGHLIGHT_SYNTAX_STYLES */";

/// The stylesheet name preferred over any other.
pub const PREFERRED_STYLESHEET: &str = "style.css";

/// Directories a new stylesheet is created in, in order of preference, before falling
/// back to the root of the book.
const CONTENT_DIRS: &[&str] = &["OEBPS", "OPS"];

static HEAD_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head>").expect("head regex is valid"));

/// The stylesheet which will receive the highlighting rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleResource {
    pub path: PathBuf,
    /// Whether the stylesheet was created by this run (and so needs linking).
    pub created: bool,
}

impl StyleResource {
    /// The bare file name, used as the `href` when linking.
    pub fn href(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Pick (or create) the stylesheet to receive the highlighting rules.
///
/// Returns `None` only when no stylesheet exists and one couldn't be created.
pub fn select_style_resource(root: &Path, new_name: &str) -> Option<StyleResource> {
    let files = walk_files(root);

    let existing = files
        .iter()
        .find(|path| path.file_name().is_some_and(|n| n == PREFERRED_STYLESHEET))
        .or_else(|| {
            files.iter().find(|path| {
                path.extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case("css"))
            })
        });
    if let Some(path) = existing {
        debug!("Using existing stylesheet {}", path.display());
        return Some(StyleResource {
            path: path.clone(),
            created: false,
        });
    }

    let dir = CONTENT_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .find(|dir| dir.is_dir())
        .unwrap_or_else(|| root.to_path_buf());
    let path = dir.join(new_name);
    match std::fs::write(&path, "") {
        Ok(()) => {
            debug!("Created stylesheet {}", path.display());
            Some(StyleResource {
                path,
                created: true,
            })
        }
        Err(e) => {
            warn!(
                "Failed to create stylesheet {}, documents will be left unstyled: {e}",
                path.display()
            );
            None
        }
    }
}

/// The rules styling the highlighted `<pre>` itself, independent of the style.
pub fn base_rules() -> String {
    format!(
        r#"
{GUARD}
/* Minimal, reader-friendly code block styling */
pre.{BLOCK_CLASS} {{
  padding: 0.8em;
  border-radius: 6px;
  border: 1px solid #d0d7de;
  background-color: #f6f8fa;
  white-space: pre-wrap;
  word-wrap: break-word;
}}
pre.{BLOCK_CLASS} code {{
  font-family: monospace;
}}
"#
    )
}

/// Append the base rules and `generated_css` to `path`, unless `guard` is already there.
///
/// Returns whether the stylesheet changed.
pub fn merge_rules(path: &Path, generated_css: &str, guard: &str) -> std::io::Result<bool> {
    let bytes = std::fs::read(path)?;
    let mut css = String::from_utf8_lossy(&bytes).into_owned();
    if css.contains(guard) {
        debug!("{} already has highlighting rules", path.display());
        return Ok(false);
    }

    css.push('\n');
    css.push_str(&base_rules());
    css.push('\n');
    css.push_str(generated_css);
    css.push('\n');
    std::fs::write(path, css)?;
    Ok(true)
}

/// Link the stylesheet at `href` from `document`'s `<head>`, unless it already is.
///
/// Documents without a `</head>` are left alone. Returns whether the document changed.
pub fn link_stylesheet(document: &Path, href: &str) -> std::io::Result<bool> {
    let bytes = std::fs::read(document)?;
    let text = String::from_utf8_lossy(&bytes);
    match insert_link(&text, href) {
        Some(linked) => {
            std::fs::write(document, linked)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// `text` with a stylesheet link to `href` added, or `None` if nothing needs doing.
fn insert_link(text: &str, href: &str) -> Option<String> {
    let already_linked = Regex::new(&format!(
        r#"(?i)href\s*=\s*["']{}["']"#,
        regex::escape(href)
    ))
    .map(|re| re.is_match(text))
    .unwrap_or(false);
    if already_linked {
        return None;
    }

    let head_close = HEAD_CLOSE_RE.find(text)?;
    let link = format!(
        r#"<link rel="stylesheet" type="text/css" href="{}"/>"#,
        html_escape::encode_double_quoted_attribute(href)
    );
    let mut out = String::with_capacity(text.len() + link.len() + 1);
    out.push_str(&text[..head_close.start()]);
    out.push_str(&link);
    out.push('\n');
    out.push_str(&text[head_close.start()..]);
    Some(out)
}
