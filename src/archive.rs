//! Unpacking an EPUB into a scratch tree and packing it back up again.
//!
//! The scratch tree lives in a temporary directory owned by [`WorkingTree`]; dropping
//! the tree removes it, so every exit path out of a run cleans up after itself.
//!
//! EPUB readers expect the `mimetype` member to be the very first entry in the archive
//! and to be stored without compression, so repacking always writes it first with
//! [`CompressionMethod::Stored`] regardless of where it sat in the input.

use crate::error::Error;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use log::{debug, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name of the member which must come first, uncompressed.
pub const MIMETYPE: &str = "mimetype";

/// An unpacked archive in an exclusively owned temporary directory.
#[derive(Debug)]
pub struct WorkingTree {
    dir: TempDir,
}

impl WorkingTree {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Every regular file in the tree, hidden files included, in sorted order.
    pub fn files(&self) -> Vec<PathBuf> {
        walk_files(self.root())
    }

    /// Every document (as decided by `matcher`) in the tree, in sorted order.
    pub fn documents(&self, matcher: &DocumentMatcher) -> Vec<PathBuf> {
        self.files()
            .into_iter()
            .filter(|path| matcher.is_document(path))
            .collect()
    }
}

/// Decides which files are markup documents by their file-name suffix.
#[derive(Debug, Clone)]
pub struct DocumentMatcher {
    globs: GlobSet,
}

impl DocumentMatcher {
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Result<DocumentMatcher, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for extension in extensions {
            let extension = extension.as_ref().trim_start_matches('.');
            builder.add(
                GlobBuilder::new(&format!("*.{extension}"))
                    .case_insensitive(true)
                    .build()?,
            );
        }
        Ok(DocumentMatcher {
            globs: builder.build()?,
        })
    }

    pub fn is_document(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.globs.is_match(name))
            .unwrap_or(false)
    }
}

/// Extract every entry of the archive at `source` into a fresh scratch tree.
pub fn unpack(source: &Path) -> Result<WorkingTree, Error> {
    let read_err = |e: zip::result::ZipError| Error::ArchiveRead(source.to_path_buf(), e);

    let file = File::open(source).map_err(|e| read_err(e.into()))?;
    let mut archive = ZipArchive::new(file).map_err(read_err)?;

    let dir = tempfile::Builder::new()
        .prefix("epub-highlight-")
        .tempdir()
        .map_err(|e| Error::Io(std::env::temp_dir(), e))?;
    let root = dir.path().to_path_buf();
    let tree = WorkingTree { dir };

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(read_err)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping archive entry with unsafe path: {}", entry.name());
            continue;
        };
        let path = root.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&path).map_err(|e| Error::Io(path.clone(), e))?;
            continue;
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Io(parent.to_path_buf(), e))?;
        }
        let mut out = File::create(&path).map_err(|e| Error::Io(path.clone(), e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| Error::Io(path.clone(), e))?;
    }

    debug!(
        "Unpacked {} entries from {} into {}",
        archive.len(),
        source.display(),
        root.display()
    );
    Ok(tree)
}

/// Write every file in `tree` into a new archive at `destination`.
///
/// Entries are written in sorted order with a fixed timestamp, so packing the same
/// tree twice produces the same bytes.
pub fn repack(tree: &WorkingTree, destination: &Path) -> Result<(), Error> {
    let write_err = |e: zip::result::ZipError| Error::ArchiveWrite(destination.to_path_buf(), e);

    let file = File::create(destination).map_err(|e| write_err(e.into()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    let options = SimpleFileOptions::default().last_modified_time(zip::DateTime::default());
    let stored = options.compression_method(CompressionMethod::Stored);
    let deflated = options.compression_method(CompressionMethod::Deflated);

    let root = tree.root();
    let mimetype = root.join(MIMETYPE);
    if mimetype.is_file() {
        let contents = std::fs::read(&mimetype).map_err(|e| Error::Io(mimetype.clone(), e))?;
        zip.start_file(MIMETYPE, stored).map_err(write_err)?;
        zip.write_all(&contents).map_err(|e| write_err(e.into()))?;
    }

    for path in tree.files() {
        let Some(name) = entry_name(root, &path) else {
            continue;
        };
        if name == MIMETYPE {
            continue;
        }

        let contents = std::fs::read(&path).map_err(|e| Error::Io(path.clone(), e))?;
        zip.start_file(name, deflated).map_err(write_err)?;
        zip.write_all(&contents).map_err(|e| write_err(e.into()))?;
    }

    let mut writer = zip.finish().map_err(write_err)?;
    writer.flush().map_err(|e| write_err(e.into()))?;
    Ok(())
}

/// The `/`-separated archive name of `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Every regular file below `root`, sorted.
pub(crate) fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to walk scratch tree: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}
