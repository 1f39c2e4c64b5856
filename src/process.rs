//! Running a whole book through the pipeline.
//!
//! Processing happens in two phases. First every document is scanned and its Python
//! blocks highlighted; only if at least one block changed does the second phase touch
//! stylesheets (merging the rules, and linking a newly created stylesheet into every
//! scanned document). A book without any Python in it therefore comes out with nothing
//! but its archive container rewritten.

use crate::archive::{self, DocumentMatcher};
use crate::blocks::rewrite_document;
use crate::error::Error;
use crate::highlight::Highlighter;
use crate::styles::{self, StyleResource, GUARD};
use derive_builder::Builder;
use indicatif::ProgressBar;
use log::{debug, info};
use std::path::{Path, PathBuf};

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct ProcessOptions {
    /// EPUB to read
    pub input: PathBuf,
    /// Where to write the processed EPUB
    pub output: PathBuf,
    /// Highlighting style name
    pub style: String,
    /// Matches the documents to scan
    pub documents: DocumentMatcher,
    /// Name given to a stylesheet created for a book which has none
    #[builder(default = r#""highlight.css".to_string()"#)]
    pub stylesheet_name: String,
}

/// What a run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub documents_scanned: usize,
    pub documents_changed: usize,
    pub blocks_highlighted: usize,
    /// Python blocks left alone because they were already highlighted
    pub blocks_skipped: usize,
    /// The stylesheet which received the highlighting rules, relative to the book root
    pub stylesheet: Option<PathBuf>,
    pub stylesheet_created: bool,
    /// Documents a newly created stylesheet was linked into
    pub documents_linked: usize,
}

/// Highlight every Python block in the book at `options.input`, writing the result to
/// `options.output`.
pub fn process(
    options: &ProcessOptions,
    highlighter: &dyn Highlighter,
    progress: &ProgressBar,
) -> Result<Report, Error> {
    let tree = archive::unpack(&options.input)?;
    let root = tree.root();
    let documents = tree.documents(&options.documents);
    let mut report = Report {
        documents_scanned: documents.len(),
        ..Default::default()
    };

    progress.set_length(documents.len() as u64);
    progress.set_message("Highlighting code blocks...");
    for path in &documents {
        let bytes = std::fs::read(path).map_err(|e| Error::Io(path.clone(), e))?;
        let text = String::from_utf8_lossy(&bytes);

        let rewrite = rewrite_document(&text, highlighter, &options.style)
            .map_err(|e| Error::Highlight(relative(root, path), e))?;
        report.blocks_highlighted += rewrite.highlighted;
        report.blocks_skipped += rewrite.skipped;

        if let Some(text) = rewrite.text {
            std::fs::write(path, text).map_err(|e| Error::Io(path.clone(), e))?;
            report.documents_changed += 1;
            debug!(
                "Highlighted {} block(s) in {}",
                rewrite.highlighted,
                relative(root, path).display()
            );
        }
        progress.inc(1);
    }

    if report.blocks_highlighted == 0 {
        info!("No Python code blocks found (expected class=\"language-python\" or similar)");
    } else if let Some(resource) = styles::select_style_resource(root, &options.stylesheet_name)
    {
        progress.set_message("Merging stylesheet...");
        let css = highlighter
            .stylesheet(&options.style)
            .map_err(|e| Error::Highlight(relative(root, &resource.path), e))?;
        styles::merge_rules(&resource.path, &css, GUARD)
            .map_err(|e| Error::Io(resource.path.clone(), e))?;

        if resource.created {
            report.documents_linked = link_documents(root, &documents, &resource)?;
        }

        report.stylesheet = Some(relative(root, &resource.path));
        report.stylesheet_created = resource.created;
    }

    progress.set_message("Packing EPUB...");
    archive::repack(&tree, &options.output)?;
    progress.finish_with_message("EPUB written");

    Ok(report)
}

/// Link a new stylesheet into every document, returning how many changed.
fn link_documents(
    root: &Path,
    documents: &[PathBuf],
    resource: &StyleResource,
) -> Result<usize, Error> {
    let href = resource.href();
    let mut linked = 0;
    for path in documents {
        if styles::link_stylesheet(path, &href).map_err(|e| Error::Io(path.clone(), e))? {
            linked += 1;
        } else {
            debug!(
                "Not linking {href} into {}",
                relative(root, path).display()
            );
        }
    }
    Ok(linked)
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::archive::test::{read_archive, write_archive};
    use crate::archive::MIMETYPE;
    use crate::error::HighlightError;
    use crate::highlight::{SyntectHighlighter, DEFAULT_STYLE};
    use zip::CompressionMethod;

    const CHAPTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<title>Chapter 1</title>
</head>
<body>
<pre><code class="language-python">print(1)</code></pre>
</body>
</html>
"#;

    const JS_CHAPTER: &str = r#"<html><head><title>JS</title></head><body>
<pre><code class="language-javascript">console.log(1 &lt; 2);</code></pre>
</body></html>
"#;

    struct Failing;

    impl Highlighter for Failing {
        fn highlight(&self, _: &str, language: &str, _: &str) -> Result<String, HighlightError> {
            Err(HighlightError::UnsupportedLanguage(language.to_string()))
        }

        fn stylesheet(&self, style: &str) -> Result<String, HighlightError> {
            Err(HighlightError::UnknownStyle(style.to_string()))
        }
    }

    fn options(input: &Path, output: &Path) -> ProcessOptions {
        ProcessOptionsBuilder::default()
            .input(input)
            .output(output)
            .style(DEFAULT_STYLE)
            .documents(DocumentMatcher::new(&["xhtml", "html", "htm"]).expect("valid globs"))
            .build()
            .expect("can build options")
    }

    fn entry<'a>(entries: &'a [(String, Vec<u8>, CompressionMethod)], name: &str) -> &'a [u8] {
        entries
            .iter()
            .find(|e| e.0 == name)
            .map(|e| e.1.as_slice())
            .unwrap_or_else(|| panic!("archive has no {name}"))
    }

    #[test]
    fn highlights_a_book_without_a_stylesheet() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let input = dir.path().join("in.epub");
        let output = dir.path().join("out.epub");
        write_archive(
            &input,
            &[
                ("OEBPS/chapter1.xhtml", CHAPTER.as_bytes(), CompressionMethod::Deflated),
                ("OEBPS/js.xhtml", JS_CHAPTER.as_bytes(), CompressionMethod::Deflated),
                (MIMETYPE, "application/epub+zip".as_bytes(), CompressionMethod::Deflated),
            ],
        );

        let report = process(
            &options(&input, &output),
            &SyntectHighlighter::new(),
            &ProgressBar::hidden(),
        )
        .expect("can process");

        assert_eq!(report.documents_scanned, 2);
        assert_eq!(report.documents_changed, 1);
        assert_eq!(report.blocks_highlighted, 1);
        assert_eq!(report.stylesheet, Some(PathBuf::from("OEBPS/highlight.css")));
        assert!(report.stylesheet_created);
        assert_eq!(report.documents_linked, 2);

        let entries = read_archive(&output);
        assert_eq!(entries[0].0, MIMETYPE);
        assert_eq!(entries[0].2, CompressionMethod::Stored);

        let chapter = String::from_utf8_lossy(entry(&entries, "OEBPS/chapter1.xhtml")).into_owned();
        assert!(chapter.contains(r#"<pre class="codehilite"><code class="language-python"><span class="syn-"#));
        assert!(chapter.contains(
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"highlight.css\"/>\n</head>"
        ));

        let css = String::from_utf8_lossy(entry(&entries, "OEBPS/highlight.css")).into_owned();
        assert!(css.contains(GUARD));
        assert!(css.contains("pre.codehilite .syn-"));

        // the javascript chapter only gains the stylesheet link
        let js = String::from_utf8_lossy(entry(&entries, "OEBPS/js.xhtml")).into_owned();
        assert!(js.contains(r#"<pre><code class="language-javascript">console.log(1 &lt; 2);</code></pre>"#));
    }

    #[test]
    fn processing_twice_changes_nothing() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let input = dir.path().join("in.epub");
        let once = dir.path().join("once.epub");
        let twice = dir.path().join("twice.epub");
        write_archive(
            &input,
            &[
                (MIMETYPE, "application/epub+zip".as_bytes(), CompressionMethod::Stored),
                ("OEBPS/chapter1.xhtml", CHAPTER.as_bytes(), CompressionMethod::Deflated),
                ("OEBPS/css/style.css", "body { margin: 0; }".as_bytes(), CompressionMethod::Deflated),
            ],
        );

        let highlighter = SyntectHighlighter::new();
        let first = process(&options(&input, &once), &highlighter, &ProgressBar::hidden())
            .expect("can process");
        assert_eq!(first.blocks_highlighted, 1);
        assert_eq!(first.stylesheet, Some(PathBuf::from("OEBPS/css/style.css")));
        assert!(!first.stylesheet_created);
        assert_eq!(first.documents_linked, 0);

        let second = process(&options(&once, &twice), &highlighter, &ProgressBar::hidden())
            .expect("can process");
        assert_eq!(second.blocks_highlighted, 0);
        assert_eq!(second.blocks_skipped, 1);
        assert_eq!(second.documents_changed, 0);
        assert_eq!(second.stylesheet, None);

        assert_eq!(
            std::fs::read(&once).expect("can read"),
            std::fs::read(&twice).expect("can read")
        );
    }

    #[test]
    fn processing_twice_with_a_created_stylesheet_changes_nothing() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let input = dir.path().join("in.epub");
        let once = dir.path().join("once.epub");
        let twice = dir.path().join("twice.epub");
        let chapter = CHAPTER.replace(
            "print(1)</code></pre>",
            "print(1)</code></pre>\n<pre><code class=\"language-python\"></code></pre>",
        );
        write_archive(
            &input,
            &[
                (MIMETYPE, "application/epub+zip".as_bytes(), CompressionMethod::Stored),
                ("OEBPS/chapter1.xhtml", chapter.as_bytes(), CompressionMethod::Deflated),
            ],
        );

        let highlighter = SyntectHighlighter::new();
        let first = process(&options(&input, &once), &highlighter, &ProgressBar::hidden())
            .expect("can process");
        assert_eq!(first.blocks_highlighted, 2);
        assert_eq!(first.stylesheet, Some(PathBuf::from("OEBPS/highlight.css")));
        assert!(first.stylesheet_created);
        assert_eq!(first.documents_linked, 1);

        let second = process(&options(&once, &twice), &highlighter, &ProgressBar::hidden())
            .expect("can process");
        assert_eq!(second.blocks_highlighted, 0);
        assert_eq!(second.blocks_skipped, 2);
        assert_eq!(second.documents_changed, 0);
        assert_eq!(second.documents_linked, 0);
        assert_eq!(second.stylesheet, None);

        let once_bytes = std::fs::read(&once).expect("can read");
        assert_eq!(once_bytes, std::fs::read(&twice).expect("can read"));

        let entries = read_archive(&twice);
        let chapter = String::from_utf8_lossy(entry(&entries, "OEBPS/chapter1.xhtml")).into_owned();
        assert_eq!(chapter.matches(r#"href="highlight.css""#).count(), 1);
        assert_eq!(chapter.matches("codehilite").count(), 2);
    }

    #[test]
    fn books_without_python_are_left_alone() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let input = dir.path().join("in.epub");
        let output = dir.path().join("out.epub");
        write_archive(
            &input,
            &[
                ("OEBPS/js.xhtml", JS_CHAPTER.as_bytes(), CompressionMethod::Deflated),
                (MIMETYPE, "application/epub+zip".as_bytes(), CompressionMethod::Stored),
            ],
        );

        // never called, so a failing highlighter is fine
        let report =
            process(&options(&input, &output), &Failing, &ProgressBar::hidden()).expect("can process");
        assert_eq!(
            report,
            Report {
                documents_scanned: 1,
                ..Default::default()
            }
        );

        let entries = read_archive(&output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entry(&entries, "OEBPS/js.xhtml"), JS_CHAPTER.as_bytes());
    }

    #[test]
    fn already_highlighted_books_report_nothing() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let input = dir.path().join("in.epub");
        let output = dir.path().join("out.epub");
        let chapter = CHAPTER.replace(
            r#"<pre><code class="language-python">print(1)</code></pre>"#,
            r#"<pre class="codehilite"><code class="language-python"><span class="n">print</span>(1)</code></pre>"#,
        );
        write_archive(
            &input,
            &[("OEBPS/chapter1.xhtml", chapter.as_bytes(), CompressionMethod::Deflated)],
        );

        let report =
            process(&options(&input, &output), &Failing, &ProgressBar::hidden()).expect("can process");
        assert_eq!(report.blocks_highlighted, 0);
        assert_eq!(report.blocks_skipped, 1);
        assert_eq!(report.documents_changed, 0);

        let entries = read_archive(&output);
        assert_eq!(entries.len(), 1);
        assert_eq!(entry(&entries, "OEBPS/chapter1.xhtml"), chapter.as_bytes());
    }

    #[test]
    fn highlighter_failures_abort_before_packing() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let input = dir.path().join("in.epub");
        let output = dir.path().join("out.epub");
        write_archive(
            &input,
            &[("OEBPS/chapter1.xhtml", CHAPTER.as_bytes(), CompressionMethod::Deflated)],
        );

        let result = process(&options(&input, &output), &Failing, &ProgressBar::hidden());
        match result {
            Err(Error::Highlight(path, _)) => {
                assert_eq!(path, PathBuf::from("OEBPS/chapter1.xhtml"))
            }
            other => panic!("expected a highlight error, got {other:?}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn unreadable_input_is_reported() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let input = dir.path().join("in.epub");
        let output = dir.path().join("out.epub");
        std::fs::write(&input, "not a zip").expect("can write");

        assert!(matches!(
            process(&options(&input, &output), &Failing, &ProgressBar::hidden()),
            Err(Error::ArchiveRead(..))
        ));
        assert!(!output.exists());
    }
}
