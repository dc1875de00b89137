//! SQLite-backed keyword search over indexed text documents.
//!
//! One database can hold several collections; each [`DocumentSearchTool`]
//! searches the collection named after the tool (for example
//! `manual-search` or `qa-search`). Rows are paragraph-sized chunks of the
//! indexed files, scored by how many distinct query terms they contain.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info};
use unicode_segmentation::UnicodeSegmentation;

use crate::agent::tool::{SearchOutput, ToolPort};
use crate::error::{AgentError, Result};

/// Default number of snippets returned per search.
pub const DEFAULT_TOP_K: usize = 5;

/// Target maximum chunk size in characters when indexing.
const MAX_CHUNK_CHARS: usize = 1_500;

/// File extensions picked up by [`DocumentStore::index_directory`].
const INDEXED_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    source_name TEXT NOT NULL,
    content TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, id);
";

/// Handle to a document database file.
///
/// Connections are opened per operation; the store itself holds only the
/// path and can be shared freely.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    /// Creates a handle for the database at `path`. Nothing is opened yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the database for writing, creating the file and schema if needed.
    ///
    /// # Errors
    ///
    /// Returns a storage or I/O error if the file cannot be created.
    pub fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    /// Adds one document to `collection`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails.
    pub fn insert(&self, collection: &str, source_name: &str, content: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO documents (collection, source_name, content) VALUES (?1, ?2, ?3)",
            params![collection, source_name, content],
        )?;
        Ok(())
    }

    /// Indexes every text file under `dir` into `collection`, one row per
    /// paragraph-sized chunk. Files are visited in path order.
    ///
    /// Returns the number of rows added.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or a file cannot be read, or a
    /// storage error if the insert fails.
    pub fn index_directory(&self, collection: &str, dir: &Path) -> Result<usize> {
        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (collection, source_name, content) VALUES (?1, ?2, ?3)",
            )?;
            for file in &files {
                let text = std::fs::read_to_string(file)?;
                let source_name = file
                    .strip_prefix(dir)
                    .unwrap_or(file)
                    .to_string_lossy()
                    .into_owned();
                for chunk in split_paragraphs(&text, MAX_CHUNK_CHARS) {
                    stmt.execute(params![collection, source_name, chunk])?;
                    added += 1;
                }
            }
        }
        tx.commit()?;

        info!(collection, files = files.len(), chunks = added, "indexed documents");
        Ok(added)
    }

    /// Number of rows in `collection`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.open()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    /// Keyword search over `collection`.
    ///
    /// Rows are ranked by the number of distinct query terms they contain
    /// (case-insensitive), ties broken by insertion order. Rows matching no
    /// term are dropped.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the database cannot be opened read-only or
    /// the query fails.
    pub fn search(&self, collection: &str, keywords: &str, top_k: usize) -> Result<Vec<SearchOutput>> {
        let terms = query_terms(keywords);
        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let mut stmt = conn.prepare(
            "SELECT source_name, content FROM documents WHERE collection = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok(SearchOutput {
                source_name: row.get(0)?,
                content: row.get(1)?,
            })
        })?;

        let mut scored: Vec<(usize, SearchOutput)> = Vec::new();
        for row in rows {
            let row = row?;
            let haystack = row.content.to_lowercase();
            let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
            if score > 0 {
                scored.push((score, row));
            }
        }
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(top_k);

        debug!(collection, terms = terms.len(), hits = scored.len(), "document search");
        Ok(scored.into_iter().map(|(_, row)| row).collect())
    }
}

/// A [`ToolPort`] searching one collection of a [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct DocumentSearchTool {
    name: String,
    description: String,
    store: DocumentStore,
    top_k: usize,
}

impl DocumentSearchTool {
    /// Creates a tool named `name` that searches the collection of the same
    /// name.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, store: DocumentStore) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            store,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Tool searching the product manual.
    #[must_use]
    pub fn manual(store: DocumentStore) -> Self {
        Self::new(
            "manual-search",
            "Search the product manual for procedures, settings and feature descriptions.",
            store,
        )
    }

    /// Tool searching past questions and answers.
    #[must_use]
    pub fn qa(store: DocumentStore) -> Self {
        Self::new(
            "qa-search",
            "Search past help desk questions and answers for similar cases and known issues.",
            store,
        )
    }

    /// Sets the number of snippets returned per search.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

#[async_trait]
impl ToolPort for DocumentSearchTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, keywords: &str) -> std::result::Result<Vec<SearchOutput>, AgentError> {
        let store = self.store.clone();
        let collection = self.name.clone();
        let keywords = keywords.to_string();
        let top_k = self.top_k;

        tokio::task::spawn_blocking(move || store.search(&collection, &keywords, top_k))
            .await
            .map_err(|e| AgentError::ToolInvocation {
                name: self.name.clone(),
                message: format!("search task failed: {e}"),
            })?
            .map_err(|e| AgentError::ToolInvocation {
                name: self.name.clone(),
                message: e.to_string(),
            })
    }
}

/// Lowercased, de-duplicated words of `keywords`, in first-seen order.
fn query_terms(keywords: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in keywords.unicode_words() {
        let word = word.to_lowercase();
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Splits text on blank lines and packs paragraphs into chunks of at most
/// `max_chars` characters. A single longer paragraph becomes its own chunk.
fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for paragraph in paragraphs {
        let needed = current.chars().count() + paragraph.chars().count() + 2;
        if !current.is_empty() && needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| INDEXED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let store = DocumentStore::new(dir.path().join("docs.db"));
        (dir, store)
    }

    #[test]
    fn test_query_terms_dedupes_and_lowercases() {
        assert_eq!(
            query_terms("Password RESET, password"),
            vec!["password".to_string(), "reset".to_string()]
        );
        assert!(query_terms("  ,, ").is_empty());
    }

    #[test]
    fn test_split_paragraphs_packs_small_paragraphs() {
        let text = "one\n\ntwo\n\n\n\nthree";
        assert_eq!(split_paragraphs(text, 100), vec!["one\n\ntwo\n\nthree"]);
        assert_eq!(split_paragraphs(text, 8), vec!["one\n\ntwo", "three"]);
    }

    #[test]
    fn test_search_ranks_by_matching_terms() {
        let (_dir, store) = store();
        store
            .insert("manual-search", "a.txt", "Backups run nightly.")
            .unwrap_or_else(|_| unreachable!());
        store
            .insert("manual-search", "b.txt", "Backup notification mail is sent by SMTP.")
            .unwrap_or_else(|_| unreachable!());
        store
            .insert("qa-search", "c.txt", "Backup notification questions.")
            .unwrap_or_else(|_| unreachable!());

        let hits = store
            .search("manual-search", "backup notification", 5)
            .unwrap_or_default();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source_name, "b.txt");
        assert_eq!(hits[1].source_name, "a.txt");
    }

    #[test]
    fn test_search_no_match_or_empty_keywords() {
        let (_dir, store) = store();
        store
            .insert("manual-search", "a.txt", "Two-factor setup.")
            .unwrap_or_else(|_| unreachable!());
        assert!(store.search("manual-search", "billing", 5).unwrap_or_default().is_empty());
        assert!(store.search("manual-search", "   ", 5).unwrap_or_default().is_empty());
    }

    #[test]
    fn test_index_directory() {
        let (dir, store) = store();
        let docs = dir.path().join("manual");
        std::fs::create_dir_all(docs.join("nested")).unwrap_or_else(|_| unreachable!());
        std::fs::write(docs.join("a.md"), "Reset your password.\n\nOpen Settings.")
            .unwrap_or_else(|_| unreachable!());
        std::fs::write(docs.join("nested/b.txt"), "Two-factor app.")
            .unwrap_or_else(|_| unreachable!());
        std::fs::write(docs.join("image.png"), "binary").unwrap_or_else(|_| unreachable!());

        let added = store
            .index_directory("manual-search", &docs)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(added, 2);
        assert_eq!(store.count("manual-search").unwrap_or_default(), 2);
    }

    #[tokio::test]
    async fn test_tool_invoke() {
        let (_dir, store) = store();
        store
            .insert("manual-search", "a.txt", "Click 'Forgot password'.")
            .unwrap_or_else(|_| unreachable!());
        let tool = DocumentSearchTool::manual(store).with_top_k(3);
        let hits = tool.invoke("forgot password").await.unwrap_or_default();
        assert_eq!(hits.len(), 1);
        assert_eq!(tool.definition().name, "manual-search");
    }

    #[tokio::test]
    async fn test_tool_missing_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let tool = DocumentSearchTool::qa(DocumentStore::new(dir.path().join("missing.db")));
        let result = tool.invoke("anything").await;
        assert!(matches!(result, Err(AgentError::ToolInvocation { .. })));
    }
}
