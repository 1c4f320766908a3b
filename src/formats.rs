use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub title: String,
    pub url: String,
}

/// A search hit before its chapter index has been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookStub {
    pub id: String,
    pub title: String,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_chapter: Option<String>,
}

impl BookStub {
    pub fn into_record(self, chapters: Vec<ChapterRef>) -> BookRecord {
        BookRecord {
            id: self.id,
            title: self.title,
            name: self.name,
            url: self.url,
            cover: self.cover,
            status: self.status,
            latest_chapter: self.latest_chapter,
            chapters,
        }
    }
}

/// Document stored as `book_<id>_info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_chapter: Option<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterRef>,
}

impl BookRecord {
    pub fn display_name(&self) -> &str {
        if !self.name.trim().is_empty() {
            &self.name
        } else if !self.title.trim().is_empty() {
            &self.title
        } else {
            &self.id
        }
    }
}

/// Document stored as `<sha256(normalized url)>.json` in the cache dir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub content: String,
    pub timestamp: i64,
}

/// Document stored as `book_<id>_progress.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub book_id: String,
    pub last_read_chapter: usize,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_book_document_fills_defaults() {
        let book: BookRecord = serde_json::from_str(r#"{"id":"42","name":"Test"}"#).unwrap();
        assert_eq!(book.id, "42");
        assert_eq!(book.name, "Test");
        assert!(book.chapters.is_empty());
        assert_eq!(book.cover, None);
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let book = BookRecord {
            id: "1".to_owned(),
            title: String::new(),
            name: "n".to_owned(),
            url: String::new(),
            cover: None,
            status: None,
            latest_chapter: None,
            chapters: Vec::new(),
        };
        let json = serde_json::to_string(&book).unwrap();
        assert!(!json.contains("cover"));
        assert!(!json.contains("latest_chapter"));
    }

    #[test]
    fn display_name_falls_back_to_title_then_id() {
        let mut book: BookRecord = serde_json::from_str(r#"{"id":"7"}"#).unwrap();
        assert_eq!(book.display_name(), "7");
        book.title = "Title".to_owned();
        assert_eq!(book.display_name(), "Title");
        book.name = "Name".to_owned();
        assert_eq!(book.display_name(), "Name");
    }
}
