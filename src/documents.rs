//! Loads source files from a folder and extracts their text.

use std::fs;
use std::panic;
use std::path::{Path, PathBuf};

use crate::error::{DocumentLoadError, IngestError};

/// Text extracted from one source file. Lives only for the ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name used for logging and content-addressed ids.
    pub name: String,
    /// Full path of the source file.
    pub path: PathBuf,
    /// Extracted text.
    pub text: String,
}

/// Source formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Portable Document Format; text is extracted page by page.
    Pdf,
    /// Plain UTF-8 text (`.txt`, `.md`).
    PlainText,
}

impl SourceKind {
    /// Classifies a path by extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Documents loaded from a folder plus the files that failed.
#[derive(Debug, Default)]
pub struct LoadedCorpus {
    /// Successfully extracted documents, sorted by file name.
    pub documents: Vec<Document>,
    /// Files that were recognized but could not be loaded.
    pub failures: Vec<DocumentLoadError>,
}

/// Reads and extracts a single file.
pub fn load_document(path: &Path) -> Result<Document, DocumentLoadError> {
    let kind = SourceKind::from_path(path).ok_or_else(|| DocumentLoadError::Extraction {
        path: path.to_path_buf(),
        reason: "unsupported file extension".to_string(),
    })?;
    let text = match kind {
        SourceKind::Pdf => {
            let bytes = fs::read(path).map_err(|source| DocumentLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            extract_pdf_text(&bytes).map_err(|reason| DocumentLoadError::Extraction {
                path: path.to_path_buf(),
                reason,
            })?
        }
        SourceKind::PlainText => {
            fs::read_to_string(path).map_err(|source| DocumentLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?
        }
    };
    if text.split_whitespace().next().is_none() {
        return Err(DocumentLoadError::Empty(path.to_path_buf()));
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document {
        name,
        path: path.to_path_buf(),
        text,
    })
}

/// The PDF parser panics on some malformed inputs; those become errors too.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, String> {
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err("pdf parser panicked".to_string()),
    }
}

/// Loads every supported file directly inside `folder`.
///
/// Unsupported files are ignored; failures of supported files are collected.
/// Only an unreadable folder is an error here; the caller decides what zero
/// documents means.
pub fn load_folder(folder: &Path) -> Result<LoadedCorpus, IngestError> {
    let entries = fs::read_dir(folder).map_err(|source| IngestError::SourceFolder {
        path: folder.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && SourceKind::from_path(path).is_some())
        .collect();
    paths.sort();

    let mut corpus = LoadedCorpus::default();
    for path in paths {
        match load_document(&path) {
            Ok(document) => {
                tracing::info!(document = %document.name, words = document.text.split_whitespace().count(), "loaded document");
                corpus.documents.push(document);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping document");
                corpus.failures.push(err);
            }
        }
    }
    Ok(corpus)
}
