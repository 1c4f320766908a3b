use anyhow::Context as _;

use crate::acquire::Acquirer;
use crate::cli::{ChaptersArgs, ReadArgs, SearchArgs, ShelfRemoveArgs};
use crate::config::Config;
use crate::formats::BookRecord;
use crate::site::menu_url_for;
use crate::store::BookStore;

pub fn open_store(config: &Config) -> anyhow::Result<BookStore> {
    BookStore::open(config.books_dir()).context("open book store")
}

pub async fn search(config: &Config, args: SearchArgs) -> anyhow::Result<()> {
    let acquirer = Acquirer::from_config(config).await?;

    if !args.save {
        let stubs = acquirer
            .search(&args.keyword)
            .await
            .ok_or_else(|| anyhow::anyhow!("search failed: {}", args.keyword))?;
        if stubs.is_empty() {
            println!("no results");
        }
        for stub in stubs {
            println!(
                "{}\t{}\t{}",
                stub.id,
                stub.name,
                stub.latest_chapter.unwrap_or_default()
            );
        }
        return Ok(());
    }

    let books = acquirer
        .search_books(&args.keyword)
        .await
        .ok_or_else(|| anyhow::anyhow!("search failed: {}", args.keyword))?;
    if books.is_empty() {
        println!("no results");
        return Ok(());
    }

    let mut store = open_store(config)?;
    for book in books {
        let book = keep_known_chapters(&store, book);
        let line = format!(
            "{}\t{}\t{} chapters",
            book.id,
            book.display_name(),
            book.chapters.len()
        );
        store.add(book).context("save book")?;
        println!("{line}");
    }
    Ok(())
}

/// A search hit whose index could not be fetched carries no chapters; it
/// must not wipe an index that is already on the shelf.
fn keep_known_chapters(store: &BookStore, mut book: BookRecord) -> BookRecord {
    if !book.chapters.is_empty() {
        return book;
    }
    if let Some(known) = store.get(&book.id).filter(|known| !known.chapters.is_empty()) {
        tracing::info!(
            book_id = %book.id,
            chapters = known.chapters.len(),
            "keeping saved chapter index"
        );
        book.chapters = known.chapters.clone();
    }
    book
}

pub async fn chapters(config: &Config, args: ChaptersArgs) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let mut book = store
        .get(&args.book_id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("book not on shelf: {}", args.book_id))?;

    let acquirer = Acquirer::from_config(config).await?;
    let chapters = acquirer
        .fetch_chapters(&menu_url_for(&book.url))
        .await
        .ok_or_else(|| anyhow::anyhow!("chapter index unavailable for book {}", book.id))?;

    book.chapters = chapters;
    let count = book.chapters.len();
    store.add(book).context("save book")?;
    println!("{}\t{count} chapters", args.book_id);
    Ok(())
}

pub async fn read(config: &Config, args: ReadArgs) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let book = store
        .get(&args.book_id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("book not on shelf: {}", args.book_id))?;

    let index = args
        .chapter
        .or_else(|| store.get_reading_progress(&book.id).map(|p| p.last_read_chapter))
        .unwrap_or(0);
    let chapter = book.chapters.get(index).ok_or_else(|| {
        anyhow::anyhow!(
            "chapter {index} out of range for book {} ({} chapters)",
            book.id,
            book.chapters.len()
        )
    })?;

    let acquirer = Acquirer::from_config(config).await?;
    let content = acquirer
        .get_content(&chapter.url, args.refresh)
        .await
        .ok_or_else(|| anyhow::anyhow!("chapter content unavailable: {}", chapter.url))?;

    println!("{}\n\n{content}", chapter.title);
    store
        .set_reading_progress(&book.id, index)
        .context("save reading progress")?;
    Ok(())
}

pub fn shelf_list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    if store.is_empty() {
        println!("no books");
        return Ok(());
    }
    for book in store.list() {
        let progress = store
            .get_reading_progress(&book.id)
            .map(|p| format!("read {}/{}", p.last_read_chapter + 1, book.chapters.len()))
            .unwrap_or_else(|| "unread".to_owned());
        println!(
            "{}\t{}\t{} chapters\t{progress}",
            book.id,
            book.display_name(),
            book.chapters.len()
        );
    }
    Ok(())
}

pub fn shelf_remove(config: &Config, args: ShelfRemoveArgs) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    store.remove(&args.book_id).context("remove book")?;
    println!("removed {}", args.book_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ChapterRef;

    fn book(id: &str, chapters: usize) -> BookRecord {
        BookRecord {
            id: id.to_owned(),
            title: String::new(),
            name: format!("Book {id}"),
            url: format!("https://www.pilishuwu.com/1/{id}/info.html"),
            cover: None,
            status: None,
            latest_chapter: None,
            chapters: (0..chapters)
                .map(|i| ChapterRef {
                    title: format!("Chapter {i}"),
                    url: format!("https://www.pilishuwu.com/1/{id}/read/{i}.html"),
                })
                .collect(),
        }
    }

    #[test]
    fn resaving_without_an_index_keeps_saved_chapters() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut store = BookStore::open(temp.path()).unwrap();
        store.add(book("7", 3)).unwrap();

        let merged = keep_known_chapters(&store, book("7", 0));
        store.add(merged).unwrap();

        let reopened = BookStore::open(temp.path()).unwrap();
        assert_eq!(reopened.get("7").unwrap().chapters.len(), 3);
    }

    #[test]
    fn fresh_index_replaces_saved_chapters() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut store = BookStore::open(temp.path()).unwrap();
        store.add(book("7", 3)).unwrap();

        let merged = keep_known_chapters(&store, book("7", 5));
        assert_eq!(merged.chapters.len(), 5);
    }

    #[test]
    fn unknown_book_without_index_stays_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = BookStore::open(temp.path()).unwrap();

        let merged = keep_known_chapters(&store, book("8", 0));
        assert!(merged.chapters.is_empty());
    }
}
