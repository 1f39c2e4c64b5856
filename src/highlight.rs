//! The boundary between the markup rewriter and the syntax highlighter.
//!
//! The rewriter only needs two things from a highlighter: a fragment of HTML for a
//! piece of source code (no wrapping element, the caller supplies the `<pre><code>`),
//! and the CSS rules which colour that fragment for a given style. Anything that can
//! provide both can stand in for syntect.

use crate::error::HighlightError;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Style used when none is configured.
pub const DEFAULT_STYLE: &str = "InspiredGitHub";

/// Class added to every highlighted `<pre>`, and the scope all generated rules live under.
pub const BLOCK_CLASS: &str = "codehilite";

/// CSS class prefix for syntax highlighting spans.
const SCOPE_PREFIX: &str = "syn-";

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed {
    prefix: SCOPE_PREFIX,
};

pub trait Highlighter {
    /// Render `source` as a fragment of classed `<span>`s.
    fn highlight(&self, source: &str, language: &str, style: &str)
        -> Result<String, HighlightError>;

    /// The CSS rules for `style`, scoped to `pre.codehilite`.
    fn stylesheet(&self, style: &str) -> Result<String, HighlightError>;
}

/// Highlighter backed by syntect's bundled syntaxes and themes.
pub struct SyntectHighlighter {
    syntaxes: SyntaxSet,
    themes: ThemeSet,
}

impl SyntectHighlighter {
    pub fn new() -> SyntectHighlighter {
        SyntectHighlighter {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes: ThemeSet::load_defaults(),
        }
    }

    /// Names of every style this highlighter knows about, sorted.
    pub fn styles(&self) -> Vec<&str> {
        // ThemeSet keeps its themes in a BTreeMap
        self.themes.themes.keys().map(String::as_str).collect()
    }

    pub fn has_style(&self, style: &str) -> bool {
        self.themes.themes.contains_key(style)
    }
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(
        &self,
        source: &str,
        language: &str,
        style: &str,
    ) -> Result<String, HighlightError> {
        // classed output doesn't depend on the theme, but an unknown style would leave
        // the spans without any rules to colour them
        if !self.has_style(style) {
            return Err(HighlightError::UnknownStyle(style.to_string()));
        }

        let syntax = self
            .syntaxes
            .find_syntax_by_token(language)
            .ok_or_else(|| HighlightError::UnsupportedLanguage(language.to_string()))?;

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, CLASS_STYLE);
        for line in LinesWithEndings::from(source) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }
        Ok(generator.finalize())
    }

    fn stylesheet(&self, style: &str) -> Result<String, HighlightError> {
        let theme = self
            .themes
            .themes
            .get(style)
            .ok_or_else(|| HighlightError::UnknownStyle(style.to_string()))?;
        let css = css_for_theme_with_class_style(theme, CLASS_STYLE)?;
        Ok(scope_rules(&css, &format!("pre.{BLOCK_CLASS}")))
    }
}

/// Prefix every selector in `css` with `scope`.
///
/// The theme's own `code` rule (its foreground and background) is applied to `scope`
/// itself, since no span carries that class. Expects one rule head per line
/// (`sel, sel {`), which is how syntect writes them. Everything else, including
/// comments and declarations, passes through untouched.
fn scope_rules(css: &str, scope: &str) -> String {
    let code_class = format!(".{SCOPE_PREFIX}code");
    let mut scoped = String::with_capacity(css.len() * 2);
    for line in css.lines() {
        let trimmed = line.trim_end();
        match trimmed.strip_suffix('{') {
            Some(selectors) if trimmed.starts_with('.') => {
                let selectors = selectors
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        if s == code_class {
                            scope.to_string()
                        } else {
                            format!("{scope} {s}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                scoped.push_str(&format!("{selectors} {{\n"));
            }
            _ => {
                scoped.push_str(line);
                scoped.push('\n');
            }
        }
    }
    scoped
}

/// Recover the text of a highlighted fragment: drop the tags, decode the entities.
#[cfg(test)]
pub(crate) fn strip_markup(html: &str) -> String {
    let tags = regex::Regex::new(r"<[^>]*>").expect("valid regex");
    html_escape::decode_html_entities(&tags.replace_all(html, "")).into_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn highlights_python_into_classed_spans() {
        let highlighter = SyntectHighlighter::new();
        let html = highlighter
            .highlight("def f(x):\n    return x < 1\n", "python", DEFAULT_STYLE)
            .expect("can highlight python");
        assert!(html.contains("<span class=\"syn-"));
        assert!(!html.contains("<pre"));
        assert!(html.contains("&lt;"));
    }

    #[test]
    fn highlighted_text_matches_the_source() {
        let highlighter = SyntectHighlighter::new();
        let source = "import os\nprint(\"a & b\", 'c' if x > 2 else None)  # done";
        let html = highlighter
            .highlight(source, "python", DEFAULT_STYLE)
            .expect("can highlight python");
        assert_eq!(strip_markup(&html), source);
    }

    #[test]
    fn unknown_style_and_language_are_errors() {
        let highlighter = SyntectHighlighter::new();
        assert!(matches!(
            highlighter.highlight("x = 1", "python", "no-such-style"),
            Err(HighlightError::UnknownStyle(_))
        ));
        assert!(matches!(
            highlighter.highlight("x = 1", "definitely-not-a-language", DEFAULT_STYLE),
            Err(HighlightError::UnsupportedLanguage(_))
        ));
        assert!(matches!(
            highlighter.stylesheet("no-such-style"),
            Err(HighlightError::UnknownStyle(_))
        ));
    }

    #[test]
    fn every_listed_style_produces_a_stylesheet() {
        let highlighter = SyntectHighlighter::new();
        assert!(highlighter.styles().contains(&DEFAULT_STYLE));
        for style in highlighter.styles() {
            let css = highlighter.stylesheet(style).expect("can generate stylesheet");
            assert!(css.contains("pre.codehilite .syn-"));
        }
    }

    #[test]
    fn theme_background_lands_on_the_block() {
        let highlighter = SyntectHighlighter::new();
        let theme = &highlighter.themes.themes["base16-ocean.dark"];
        let bg = theme.settings.background.expect("theme has a background");
        let css = highlighter
            .stylesheet("base16-ocean.dark")
            .expect("can generate stylesheet");

        let start = css.find("pre.codehilite {").expect("has a block rule");
        let rule = css[start..].split('}').next().expect("rule has a body");
        assert!(rule.contains(&format!("#{:02x}{:02x}{:02x}", bg.r, bg.g, bg.b)));
        assert!(!css.contains("pre.codehilite .syn-code {"));
    }

    #[test]
    fn every_selector_gets_scoped() {
        let css = "/*\n * theme\n */\n.syn-code {\n color: #000;\n}\n\n.syn-comment, .syn-string .syn-quoted {\n color: #aaa;\n}\n";
        assert_eq!(
            scope_rules(css, "pre.codehilite"),
            "/*\n * theme\n */\npre.codehilite {\n color: #000;\n}\n\npre.codehilite .syn-comment, pre.codehilite .syn-string .syn-quoted {\n color: #aaa;\n}\n"
        );
    }
}
