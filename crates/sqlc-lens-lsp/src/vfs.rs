//! Virtual File System for document management.
//!
//! The VFS maintains the in-memory state of all open documents.
//! Documents cache their parsed form so hover and code lens requests
//! don't re-parse unchanged text.

use ropey::Rope;
use sqlc_lens_core::{parse_source, LookupError, ParsedSource};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A document in the virtual file system.
#[derive(Debug)]
pub struct Document {
    /// The document content as a rope.
    content: Rope,
    /// The document version (incremented on each change).
    version: i32,
    /// Cached parse result (lazily computed, invalidated on change).
    parse_cache: Option<Arc<ParsedSource>>,
}

impl Document {
    /// Create a new document with the given content.
    pub fn new(content: &str, version: i32) -> Self {
        Self {
            content: Rope::from_str(content),
            version,
            parse_cache: None,
        }
    }

    /// Get the document content as a string.
    pub fn text(&self) -> String {
        self.content.to_string()
    }

    /// Get the document version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Get or compute the parse result (cached).
    ///
    /// `path` selects the grammar.
    pub fn parsed(&mut self, path: &Path) -> Result<Arc<ParsedSource>, LookupError> {
        if let Some(parsed) = &self.parse_cache {
            return Ok(Arc::clone(parsed));
        }
        let parsed = Arc::new(parse_source(&self.text(), path)?);
        self.parse_cache = Some(Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Whether a parse result is cached.
    pub fn is_parsed(&self) -> bool {
        self.parse_cache.is_some()
    }

    /// Update the document content.
    pub fn update(&mut self, content: &str, version: i32) {
        self.content = Rope::from_str(content);
        self.version = version;
        self.parse_cache = None;
    }
}

/// Virtual file system for managing open documents.
#[derive(Debug, Default)]
pub struct Vfs {
    /// Open documents indexed by path.
    documents: HashMap<PathBuf, Document>,
}

impl Vfs {
    /// Create a new empty VFS.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a document in the VFS.
    pub fn open(&mut self, path: PathBuf, content: &str, version: i32) {
        self.documents.insert(path, Document::new(content, version));
    }

    /// Close a document in the VFS.
    pub fn close(&mut self, path: &Path) {
        self.documents.remove(path);
    }

    /// Get a document by path.
    pub fn get(&self, path: &Path) -> Option<&Document> {
        self.documents.get(path)
    }

    /// Get document content as a string.
    pub fn get_content(&self, path: &Path) -> Option<String> {
        self.documents.get(path).map(Document::text)
    }

    /// Get document content and cached parse result.
    ///
    /// Returns `None` for unknown documents and for documents that fail to
    /// parse (the failure is logged).
    pub fn get_document_data(&mut self, path: &Path) -> Option<(String, Arc<ParsedSource>)> {
        let doc = self.documents.get_mut(path)?;
        match doc.parsed(path) {
            Ok(parsed) => Some((doc.text(), parsed)),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    /// Update a document's content.
    pub fn update(&mut self, path: &Path, content: &str, version: i32) {
        if let Some(doc) = self.documents.get_mut(path) {
            doc.update(content, version);
        }
    }

    /// Get all open document paths.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.documents.keys()
    }
}
