//! Book shelf backed by one JSON document per book.
//!
//! Writes go to disk first and only then into the in-memory map, so a
//! failed write never leaves memory ahead of disk. `refresh` rebuilds the
//! map from the documents alone.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::document::{read_json, remove_if_exists, write_json_atomic};
use crate::error::PersistenceError;
use crate::formats::{BookRecord, ReadingProgress};

const BOOK_PREFIX: &str = "book_";
const INFO_SUFFIX: &str = "_info.json";
const PROGRESS_SUFFIX: &str = "_progress.json";

#[derive(Debug)]
pub struct BookStore {
    dir: PathBuf,
    books: BTreeMap<String, BookRecord>,
    progress: BTreeMap<String, ReadingProgress>,
}

impl BookStore {
    /// No I/O happens until [`BookStore::init`] and [`BookStore::refresh`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            books: BTreeMap::new(),
            progress: BTreeMap::new(),
        }
    }

    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let mut store = Self::new(dir);
        store.init()?;
        store.refresh();
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the store directory. Safe to call repeatedly.
    pub fn init(&self) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| PersistenceError::io("create store dir", &self.dir, err))
    }

    pub fn book_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{BOOK_PREFIX}{id}{INFO_SUFFIX}"))
    }

    pub fn progress_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{BOOK_PREFIX}{id}{PROGRESS_SUFFIX}"))
    }

    /// Scans every book document. Unreadable documents are logged and
    /// skipped.
    pub fn load(&self) -> BTreeMap<String, BookRecord> {
        let mut books = BTreeMap::new();
        for path in self.documents(INFO_SUFFIX) {
            match read_json::<BookRecord>(&path) {
                Ok(book) if !book.id.trim().is_empty() => {
                    books.insert(book.id.clone(), book);
                }
                Ok(_) => tracing::warn!(path = %path.display(), "book document without id; skipping"),
                Err(err) => tracing::error!(error = %err, "skipping unreadable book document"),
            }
        }
        tracing::info!(count = books.len(), dir = %self.dir.display(), "loaded book shelf");
        books
    }

    fn load_progress(&self, books: &BTreeMap<String, BookRecord>) -> BTreeMap<String, ReadingProgress> {
        let mut progress = BTreeMap::new();
        for path in self.documents(PROGRESS_SUFFIX) {
            match read_json::<ReadingProgress>(&path) {
                Ok(entry) if books.contains_key(&entry.book_id) => {
                    progress.insert(entry.book_id.clone(), entry);
                }
                Ok(entry) => {
                    tracing::debug!(book_id = %entry.book_id, "progress for unknown book; ignoring")
                }
                Err(err) => tracing::error!(error = %err, "skipping unreadable progress document"),
            }
        }
        progress
    }

    fn documents(&self, suffix: &str) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(dir = %self.dir.display(), ?err, "read store dir failed");
                return Vec::new();
            }
        };

        let mut paths = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(BOOK_PREFIX) && name.ends_with(suffix))
            })
            .collect::<Vec<_>>();
        paths.sort();
        paths
    }

    /// Discards all in-memory state and reloads from disk.
    pub fn refresh(&mut self) {
        let books = self.load();
        self.progress = self.load_progress(&books);
        self.books = books;
    }

    /// Persists the book, replacing any document with the same id.
    pub fn add(&mut self, book: BookRecord) -> Result<(), PersistenceError> {
        validate_id(&book.id)?;
        let path = self.book_path(&book.id);
        if let Err(err) = write_json_atomic(&path, &book) {
            tracing::error!(book_id = %book.id, error = %err, "add book failed");
            return Err(err);
        }
        tracing::info!(book_id = %book.id, chapters = book.chapters.len(), "saved book");
        self.books.insert(book.id.clone(), book);
        Ok(())
    }

    /// Removing an unknown id succeeds.
    pub fn remove(&mut self, id: &str) -> Result<(), PersistenceError> {
        validate_id(id)?;
        remove_if_exists(&self.book_path(id))?;
        self.books.remove(id);

        if let Err(err) = remove_if_exists(&self.progress_path(id)) {
            tracing::warn!(book_id = id, error = %err, "remove reading progress failed");
        }
        self.progress.remove(id);
        tracing::info!(book_id = id, "removed book");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&BookRecord> {
        self.books.get(id)
    }

    pub fn list(&self) -> Vec<&BookRecord> {
        self.books.values().collect()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn get_reading_progress(&self, book_id: &str) -> Option<&ReadingProgress> {
        self.progress.get(book_id)
    }

    pub fn set_reading_progress(
        &mut self,
        book_id: &str,
        chapter_index: usize,
    ) -> Result<(), PersistenceError> {
        let book = self
            .books
            .get(book_id)
            .ok_or_else(|| PersistenceError::UnknownBook(book_id.to_owned()))?;
        if chapter_index >= book.chapters.len() {
            return Err(PersistenceError::ChapterOutOfRange {
                book_id: book_id.to_owned(),
                index: chapter_index,
                len: book.chapters.len(),
            });
        }

        let progress = ReadingProgress {
            book_id: book_id.to_owned(),
            last_read_chapter: chapter_index,
            updated_at: chrono::Utc::now().timestamp(),
        };
        write_json_atomic(&self.progress_path(book_id), &progress)?;
        self.progress.insert(book_id.to_owned(), progress);
        Ok(())
    }
}

/// Ids become file name components.
fn validate_id(id: &str) -> Result<(), PersistenceError> {
    let valid = !id.trim().is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidId(id.to_owned()))
    }
}
