//! Extraction rules for the three page shapes of the source site.

use std::time::Duration;

use url::Url;

use crate::error::FetchError;
use crate::formats::{BookStub, ChapterRef};
use crate::schema::{FieldRule, Record, Schema};
use crate::session::ReadyCondition;

#[derive(Debug, Clone)]
pub struct PageRules {
    pub ready: ReadyCondition,
    pub schema: Schema,
}

#[derive(Debug, Clone)]
pub struct SiteRules {
    pub base_url: Url,
    pub search: PageRules,
    pub chapter_index: PageRules,
    pub chapter_body: PageRules,
}

impl SiteRules {
    /// Rules for pilishuwu-style listings. The search result page has no
    /// marker that is present for both hits and empty results, so it falls
    /// back to `search_settle`. Index and body pages wait up to
    /// `marker_wait` for their first item; an index with no chapters never
    /// shows one and is still a valid page.
    pub fn pilishuwu(base_url: Url, search_settle: Duration, marker_wait: Duration) -> Self {
        Self {
            base_url,
            search: PageRules {
                ready: ReadyCondition::Settle(search_settle),
                schema: Schema::scoped(
                    ".mod_book_list li",
                    vec![
                        FieldRule::attr("href", "a.mod_book_cover", "href"),
                        FieldRule::attr("title", "a.mod_book_cover", "title"),
                        FieldRule::attr("cover", "img.img100x133", "src"),
                        FieldRule::text("latest_chapter", ".mod_book_update"),
                        FieldRule::text("name", ".mod_book_name a"),
                        FieldRule::text("status", ".novel_process2"),
                    ],
                ),
            },
            chapter_index: PageRules {
                ready: ReadyCondition::Marker {
                    selector: ".works-chapter-item a".to_owned(),
                    max_wait: marker_wait,
                },
                schema: Schema::scoped(
                    ".works-chapter-item",
                    vec![
                        FieldRule::text("title", "a"),
                        FieldRule::attr("href", "a", "href").required(),
                    ],
                ),
            },
            chapter_body: PageRules {
                ready: ReadyCondition::Marker {
                    selector: ".read-content".to_owned(),
                    max_wait: marker_wait,
                },
                schema: Schema::document(vec![
                    FieldRule::text("paragraphs", ".read-content p")
                        .many()
                        .required(),
                ]),
            },
        }
    }

    pub fn search_url(&self, keyword: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::navigation(&self.base_url, "base url cannot hold a path"))?
            .clear()
            .extend(["search", "0", keyword.trim(), "1.html"]);
        Ok(url)
    }

    pub fn resolve(&self, href: &str) -> Option<Url> {
        self.base_url.join(href.trim()).ok()
    }

    /// Items without a usable link or id are dropped.
    pub fn parse_search(&self, records: &[Record]) -> Vec<BookStub> {
        records
            .iter()
            .filter_map(|record| {
                let Some(href) = record.one("href") else {
                    tracing::debug!(?record, "search item without link; skipping");
                    return None;
                };
                let Some(id) = book_id_from_href(href) else {
                    tracing::debug!(href, "search item href has no book id; skipping");
                    return None;
                };
                let url = self.resolve(href)?;
                Some(BookStub {
                    id,
                    title: record.one("title").unwrap_or_default().to_owned(),
                    name: record.one("name").unwrap_or_default().to_owned(),
                    url: url.to_string(),
                    cover: record
                        .one("cover")
                        .and_then(|src| self.resolve(src))
                        .map(String::from),
                    status: record.one("status").map(str::to_owned),
                    latest_chapter: record.one("latest_chapter").map(str::to_owned),
                })
            })
            .collect()
    }

    /// Keeps the page order; it is the canonical reading order.
    pub fn parse_chapter_index(&self, records: &[Record]) -> Result<Vec<ChapterRef>, FetchError> {
        records
            .iter()
            .map(|record| {
                let href = record
                    .one("href")
                    .ok_or_else(|| FetchError::extraction("href", "chapter item without link"))?;
                let url = self
                    .resolve(href)
                    .ok_or_else(|| FetchError::extraction("href", format!("unresolvable {href:?}")))?;
                Ok(ChapterRef {
                    title: record.one("title").unwrap_or_default().to_owned(),
                    url: url.to_string(),
                })
            })
            .collect()
    }

    pub fn parse_chapter_body(&self, records: &[Record]) -> Result<String, FetchError> {
        let body = records
            .first()
            .map(|record| record.many("paragraphs").join("\n\n"))
            .unwrap_or_default();
        if body.is_empty() {
            return Err(FetchError::extraction("paragraphs", "chapter body is empty"));
        }
        Ok(body)
    }
}

/// `/1/4545/info.html` -> `4545`.
pub fn book_id_from_href(href: &str) -> Option<String> {
    let path = match Url::parse(href) {
        Ok(url) => url.path().to_owned(),
        Err(_) => href.to_owned(),
    };
    path.split('/')
        .nth(2)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}

/// The chapter index lives next to the info page.
pub fn menu_url_for(book_url: &str) -> String {
    book_url.replace("/info.html", "/menu/1.html")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> SiteRules {
        SiteRules::pilishuwu(
            Url::parse("https://www.pilishuwu.com").unwrap(),
            Duration::from_secs(2),
            Duration::from_secs(10),
        )
    }

    const SEARCH_PAGE: &str = r#"<html><body>
<ul class="mod_book_list">
  <li>
    <a class="mod_book_cover" href="/1/4545/info.html" title="Sword Song">
      <img class="img100x133" src="/cover/4545.jpg"></a>
    <p class="mod_book_name"><a href="/1/4545/info.html">Sword Song</a></p>
    <p class="mod_book_update">Chapter 120</p>
    <span class="novel_process2">serializing</span>
  </li>
  <li><p class="mod_book_name"><a>No link</a></p></li>
  <li>
    <a class="mod_book_cover" href="/2/77/info.html" title="Other"></a>
  </li>
</ul></body></html>"#;

    #[test]
    fn search_items_become_stubs_with_absolute_urls() {
        let rules = rules();
        let records = rules.search.schema.extract(SEARCH_PAGE).unwrap();
        let stubs = rules.parse_search(&records);

        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].id, "4545");
        assert_eq!(stubs[0].url, "https://www.pilishuwu.com/1/4545/info.html");
        assert_eq!(stubs[0].title, "Sword Song");
        assert_eq!(stubs[0].name, "Sword Song");
        assert_eq!(
            stubs[0].cover.as_deref(),
            Some("https://www.pilishuwu.com/cover/4545.jpg")
        );
        assert_eq!(stubs[0].status.as_deref(), Some("serializing"));
        assert_eq!(stubs[0].latest_chapter.as_deref(), Some("Chapter 120"));
        assert_eq!(stubs[1].id, "77");
        assert_eq!(stubs[1].cover, None);
    }

    #[test]
    fn chapter_index_preserves_page_order() {
        let html = r#"<div>
<div class="works-chapter-item"><a href="/1/4545/read/3.html">Chapter 3</a></div>
<div class="works-chapter-item"><a href="/1/4545/read/1.html">Chapter 1</a></div>
</div>"#;
        let rules = rules();
        let records = rules.chapter_index.schema.extract(html).unwrap();
        let chapters = rules.parse_chapter_index(&records).unwrap();
        let titles: Vec<_> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Chapter 3", "Chapter 1"]);
        assert_eq!(chapters[0].url, "https://www.pilishuwu.com/1/4545/read/3.html");
    }

    #[test]
    fn untitled_chapter_keeps_its_place_in_the_index() {
        let html = r#"<div>
<div class="works-chapter-item"><a href="/1/4545/read/1.html">Ch 1</a></div>
<div class="works-chapter-item"><a href="/1/4545/read/2.html"> </a></div>
<div class="works-chapter-item"><a href="/1/4545/read/3.html">Ch 3</a></div>
</div>"#;
        let rules = rules();
        let records = rules.chapter_index.schema.extract(html).unwrap();
        let chapters = rules.parse_chapter_index(&records).unwrap();
        let titles: Vec<_> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Ch 1", "", "Ch 3"]);
        assert_eq!(chapters[1].url, "https://www.pilishuwu.com/1/4545/read/2.html");
    }

    #[test]
    fn chapter_item_without_link_fails_the_index() {
        let html = r#"<div class="works-chapter-item"><a>Ch 1</a></div>"#;
        let err = rules().chapter_index.schema.extract(html).unwrap_err();
        assert!(matches!(err, FetchError::Extraction { ref field, .. } if field == "href"));
    }

    #[test]
    fn index_and_body_pages_tolerate_a_missing_marker() {
        let rules = rules();
        for ready in [&rules.chapter_index.ready, &rules.chapter_body.ready] {
            assert!(matches!(
                ready,
                ReadyCondition::Marker { max_wait, .. } if *max_wait == Duration::from_secs(10)
            ));
        }
    }

    #[test]
    fn empty_chapter_index_is_not_an_error() {
        let rules = rules();
        let records = rules
            .chapter_index
            .schema
            .extract("<html><body></body></html>")
            .unwrap();
        assert!(rules.parse_chapter_index(&records).unwrap().is_empty());
    }

    #[test]
    fn chapter_body_joins_non_empty_paragraphs() {
        let html = r#"<div class="read-content"><p> First. </p><p> </p><p>Second.</p></div>"#;
        let rules = rules();
        let records = rules.chapter_body.schema.extract(html).unwrap();
        assert_eq!(
            rules.parse_chapter_body(&records).unwrap(),
            "First.\n\nSecond."
        );
    }

    #[test]
    fn chapter_body_without_content_is_an_extraction_error() {
        let rules = rules();
        let err = rules
            .chapter_body
            .schema
            .extract("<div class='read-content'></div>")
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn search_url_encodes_keyword_as_path_segment() {
        let url = rules().search_url("剑 来").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.pilishuwu.com/search/0/%E5%89%91%20%E6%9D%A5/1.html"
        );
    }

    #[test]
    fn book_id_is_the_third_path_component() {
        assert_eq!(book_id_from_href("/1/4545/info.html").as_deref(), Some("4545"));
        assert_eq!(
            book_id_from_href("https://www.pilishuwu.com/1/4545/info.html").as_deref(),
            Some("4545")
        );
        assert_eq!(book_id_from_href("/info.html"), None);
    }

    #[test]
    fn menu_url_replaces_info_page() {
        assert_eq!(
            menu_url_for("https://www.pilishuwu.com/1/4545/info.html"),
            "https://www.pilishuwu.com/1/4545/menu/1.html"
        );
    }
}
