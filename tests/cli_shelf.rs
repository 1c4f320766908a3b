use predicates::prelude::*;

fn write_book(dir: &std::path::Path, id: &str, name: &str, chapters: usize) {
    let chapters: Vec<_> = (0..chapters)
        .map(|i| {
            serde_json::json!({
                "title": format!("Chapter {i}"),
                "url": format!("https://www.pilishuwu.com/1/{id}/read/{i}.html"),
            })
        })
        .collect();
    let doc = serde_json::json!({ "id": id, "name": name, "chapters": chapters });
    std::fs::write(
        dir.join(format!("book_{id}_info.json")),
        serde_json::to_vec_pretty(&doc).unwrap(),
    )
    .unwrap();
}

#[test]
fn shelf_list_on_empty_dir_says_no_books() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("novelshelf");
    cmd.args(["shelf", "list", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout("no books\n");
}

#[test]
fn shelf_list_shows_saved_books() {
    let temp = tempfile::TempDir::new().unwrap();
    write_book(temp.path(), "42", "Test", 3);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("novelshelf");
    cmd.args(["shelf", "list", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout("42\tTest\t3 chapters\tunread\n");
}

#[test]
fn shelf_remove_is_idempotent() {
    let temp = tempfile::TempDir::new().unwrap();
    write_book(temp.path(), "42", "Test", 1);

    for _ in 0..2 {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("novelshelf");
        cmd.args(["shelf", "remove", "42", "--data-dir"])
            .arg(temp.path())
            .assert()
            .success()
            .stdout("removed 42\n");
    }
    assert!(!temp.path().join("book_42_info.json").exists());
}

#[test]
fn read_unknown_book_fails_without_launching_a_browser() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("novelshelf");
    cmd.args(["read", "missing", "--data-dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("book not on shelf: missing"));
}

#[test]
fn novelshelf_log_debug_emits_debug_line_to_stderr() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("novelshelf");
    cmd.env("NOVELSHELF_LOG", "debug")
        .args(["shelf", "list", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}
