//! Integration tests for the mirror
//!
//! These tests use wiremock to serve a small GB-encoded forum and run the
//! full directory -> thread list -> post -> SQLite pipeline against it.

use encoding_rs::GB18030;
use lily_mirror::config::{Config, StorageConfig};
use lily_mirror::observer::NullObserver;
use lily_mirror::storage::{SqliteStorage, Storage};
use lily_mirror::{Mirror, MirrorError, RunSummary};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GB_HTML: &str = "text/html; charset=gb2312";

fn gb(text: &str) -> Vec<u8> {
    GB18030.encode(text).0.into_owned()
}

fn gb_page(html: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(gb(html), GB_HTML)
}

fn directory_html(boards: &[(&str, &str, &str)]) -> String {
    let rows: String = boards
        .iter()
        .enumerate()
        .map(|(i, (name, category, description))| {
            format!(
                "<tr><td>{}</td><td><a href=\"bbsdoc?board={}\">{}</a></td><td>{}</td><td>{}</td></tr>",
                i + 1,
                name,
                name,
                category,
                description
            )
        })
        .collect();

    format!(
        "<html><body><center>小百合 全部讨论区<hr><table>\
         <tr><td>序号</td><td>讨论区名称</td><td>类别</td><td>中文描述</td></tr>\
         {}</table></center></body></html>",
        rows
    )
}

fn list_html(board: &str, files: &[&str], next: bool) -> String {
    let rows: String = files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            format!(
                "<tr><td>{}</td><td>sysop</td><td>Jan 1</td><td>0</td>\
                 <td><a href=\"bbstcon?board={}&file={}\">○ thread {}</a></td></tr>",
                i + 1,
                board,
                file,
                file
            )
        })
        .collect();
    let pager = if next {
        format!("<a href=\"bbstdoc?board={}&start=999\">下一页</a>", board)
    } else {
        String::new()
    };

    format!(
        "<html><body><center><table>\
         <tr><td>序号</td><td>作者</td><td>日期</td><td>回复</td><td>标题</td></tr>\
         {}</table>{}</center></body></html>",
        rows, pager
    )
}

fn thread_html(posts: &[(&str, &str, &str)]) -> String {
    posts
        .iter()
        .map(|(sender, title, time)| {
            format!(
                "<table class=\"main\"><tr><td><textarea>发信人: {} (nick), 信区: test\r\n\
                 标  题: {}\r\n发信站: 南京大学小百合站 ({})\r\n\r\n正文</textarea></td></tr></table>",
                sender, title, time
            )
        })
        .collect()
}

async fn mount_directory(server: &MockServer, boards: &[(&str, &str, &str)]) {
    Mock::given(method("GET"))
        .and(path("/bbsall"))
        .respond_with(gb_page(&directory_html(boards)))
        .mount(server)
        .await;
}

async fn mount_list(server: &MockServer, board: &str, start: u32, html: String) {
    Mock::given(method("GET"))
        .and(path("/bbstdoc"))
        .and(query_param("board", board))
        .and(query_param("start", start.to_string()))
        .respond_with(gb_page(&html))
        .mount(server)
        .await;
}

async fn mount_thread(server: &MockServer, file: &str, html: String) {
    Mock::given(method("GET"))
        .and(path("/bbstcon"))
        .and(query_param("file", file))
        .respond_with(gb_page(&html))
        .mount(server)
        .await;
}

/// Creates a test configuration pointing at the mock forum
fn create_test_config(base_url: &str, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.site.base_url = format!("{}/", base_url);
    config.site.utc_offset_hours = 0;
    config.fetch.retry_limit = 2;
    config.fetch.retry_delay_ms = 1;
    config.fetch.timeout_secs = 5;
    config.storage.database_path = db_path.display().to_string();
    config
}

/// Runs the blocking pipeline off the async runtime
async fn run_mirror(config: Config) -> Result<RunSummary, MirrorError> {
    tokio::task::spawn_blocking(move || {
        let mirror = Mirror::from_config(config, Arc::new(NullObserver))?;
        mirror.run()
    })
    .await
    .expect("mirror task panicked")
}

fn open_storage(db_path: &Path) -> SqliteStorage {
    SqliteStorage::new(db_path, &StorageConfig::default()).expect("Failed to open storage")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_mirror_of_paginated_boards() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("lily.db");

    mount_directory(
        &server,
        &[("tech", "[电脑]", "○ 技术讨论"), ("life", "[社会]", "○ 生活")],
    )
    .await;

    mount_list(&server, "tech", 0, list_html("tech", &["M.1", "M.2"], true)).await;
    mount_list(&server, "tech", 2, list_html("tech", &["M.3"], false)).await;
    mount_list(&server, "life", 0, list_html("life", &["L.1"], false)).await;

    mount_thread(
        &server,
        "M.1",
        thread_html(&[
            ("sysop", "朱镕基讲话", "Sat Jan  1 10:00:00 2020"),
            ("guest", "Re: 朱镕基讲话", "Sun Jan  2 11:00:00 2020"),
        ]),
    )
    .await;
    mount_thread(
        &server,
        "M.2",
        thread_html(&[("alice", "Hello", "Jan 1 10:00:00 2020")]),
    )
    .await;
    // M.3 has lost its header
    Mock::given(method("GET"))
        .and(path("/bbstcon"))
        .and(query_param("file", "M.3"))
        .respond_with(gb_page(
            "<table class=\"main\"><tr><td><textarea>no header here</textarea></td></tr></table>",
        ))
        .mount(&server)
        .await;
    // L.1 is missing entirely
    Mock::given(method("GET"))
        .and(path("/bbstcon"))
        .and(query_param("file", "L.1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let summary = run_mirror(create_test_config(&server.uri(), &db_path))
        .await
        .expect("mirror run failed");

    assert_eq!(summary.boards_listed, 2);
    assert_eq!(summary.boards_mirrored, 2);
    assert_eq!(summary.documents_saved, 3);
    assert!(summary.aborted_boards.is_empty());

    let storage = open_storage(&db_path);

    let boards = storage.list_boards().unwrap();
    assert_eq!(boards.len(), 2);
    assert_eq!(boards[0].name, "tech");
    assert_eq!(boards[0].category, "电脑");
    assert_eq!(boards[0].description, "技术讨论");

    let tech = storage.table_for("tech").unwrap().unwrap();
    assert_eq!(storage.count_documents(&tech).unwrap(), 3);

    let first = storage
        .get_document(&tech, &format!("{}/bbstcon?board=tech&file=M.1", server.uri()))
        .unwrap()
        .expect("M.1 not stored");
    assert_eq!(first.title, "朱镕基讲话");
    assert_eq!(first.creator, "sysop");
    assert_eq!(first.create_time, 1577872800);
    assert_eq!(first.update_time, 1577962800);
    assert!(!first.content.contains('\r'));

    let headless = storage
        .get_document(&tech, &format!("{}/bbstcon?board=tech&file=M.3", server.uri()))
        .unwrap()
        .expect("M.3 not stored");
    assert!(headless.is_sentinel());
    assert_eq!(headless.content, "no header here");

    let life = storage.table_for("life").unwrap().unwrap();
    assert_eq!(storage.count_documents(&life).unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_list_page_keeps_earlier_threads() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("lily.db");

    mount_directory(&server, &[("tech", "[IT]", "○ desc")]).await;
    mount_list(&server, "tech", 0, list_html("tech", &["M.1"], true)).await;
    Mock::given(method("GET"))
        .and(path("/bbstdoc"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_thread(
        &server,
        "M.1",
        thread_html(&[("sysop", "kept", "Jan 1 10:00:00 2020")]),
    )
    .await;

    let summary = run_mirror(create_test_config(&server.uri(), &db_path))
        .await
        .expect("mirror run failed");

    assert_eq!(summary.documents_saved, 1);

    let storage = open_storage(&db_path);
    let tech = storage.table_for("tech").unwrap().unwrap();
    assert_eq!(storage.count_documents(&tech).unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_run_retains_removed_board() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("lily.db");

    mount_directory(&server, &[("tech", "[IT]", "○ a"), ("life", "[社会]", "○ b")]).await;
    mount_list(&server, "tech", 0, list_html("tech", &["M.1"], false)).await;
    mount_list(&server, "life", 0, list_html("life", &["L.1"], false)).await;
    mount_thread(&server, "M.1", thread_html(&[("a", "v1", "Jan 1 10:00:00 2020")])).await;
    mount_thread(&server, "L.1", thread_html(&[("b", "life", "Jan 1 10:00:00 2020")])).await;

    run_mirror(create_test_config(&server.uri(), &db_path))
        .await
        .expect("first run failed");

    server.reset().await;
    mount_directory(&server, &[("tech", "[IT]", "○ a")]).await;
    mount_list(&server, "tech", 0, list_html("tech", &["M.1"], false)).await;
    mount_thread(&server, "M.1", thread_html(&[("a", "v2", "Jan 1 10:00:00 2020")])).await;

    let summary = run_mirror(create_test_config(&server.uri(), &db_path))
        .await
        .expect("second run failed");

    assert_eq!(summary.removed_boards, vec!["life".to_string()]);

    let storage = open_storage(&db_path);
    let names: Vec<String> = storage
        .list_boards()
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(names, vec!["tech".to_string()]);

    // Re-crawled thread replaced in place
    let tech = storage.table_for("tech").unwrap().unwrap();
    assert_eq!(storage.count_documents(&tech).unwrap(), 1);
    let doc = storage
        .get_document(&tech, &format!("{}/bbstcon?board=tech&file=M.1", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(doc.title, "v2");

    // The removed board's archive survives
    let life = storage.table_for("life").unwrap().expect("binding dropped");
    assert_eq!(storage.count_documents(&life).unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_directory_fails_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Error statuses are not connection failures and must not be retried
    Mock::given(method("GET"))
        .and(path("/bbsall"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri(), &dir.path().join("lily.db"));
    config.fetch.retry_limit = 5;
    let result = run_mirror(config).await;

    assert!(matches!(
        result,
        Err(MirrorError::FetchFailed { attempts: 1, .. })
    ));
    server.verify().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_status_on_thread_page_is_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("lily.db");

    mount_directory(&server, &[("tech", "[IT]", "○ desc")]).await;
    mount_list(&server, "tech", 0, list_html("tech", &["M.1"], false)).await;
    Mock::given(method("GET"))
        .and(path("/bbstcon"))
        .and(query_param("file", "M.1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri(), &db_path);
    config.fetch.retry_limit = 5;
    let summary = run_mirror(config).await.expect("mirror run failed");

    assert_eq!(summary.documents_saved, 0);
    server.verify().await;
}
