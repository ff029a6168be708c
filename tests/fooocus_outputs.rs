//! 输出目录扫描与轮询行为测试
//!
//! 覆盖回退检测的核心约定：只认调用开始之后出现的文件、
//! 按修改时间取最新、以及轮询在超时边界内结束。

mod common;

use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime};

use fooocus_bot::fooocus::{find_newest_output, poll_outputs};
use tempfile::TempDir;
use tokio::time::Instant;

#[test]
fn test_scan_ignores_files_before_start() {
    common::setup();
    let root = TempDir::new().unwrap();
    common::write_output(root.path(), "2024-05-01", "old.png");

    // 视为在所有现存文件之后才开始调用（超出 1 秒容差）
    let after = SystemTime::now() + Duration::from_secs(10);
    assert_eq!(find_newest_output(root.path(), after), None);
}

#[test]
fn test_scan_finds_file_created_after_start() {
    common::setup();
    let root = TempDir::new().unwrap();
    let path = common::write_output(root.path(), "2024-05-01", "fresh.png");

    let after = SystemTime::now() - Duration::from_secs(10);
    assert_eq!(find_newest_output(root.path(), after), Some(path));
}

#[test]
fn test_scan_grace_window_tolerates_clock_skew() {
    common::setup();
    let root = TempDir::new().unwrap();
    let path = common::write_output(root.path(), "2024-05-01", "skewed.png");

    // 开始时间比文件 mtime 晚 500ms，仍落在 1 秒容差窗口内
    let after = SystemTime::now() + Duration::from_millis(500);
    assert_eq!(find_newest_output(root.path(), after), Some(path));
}

#[test]
fn test_scan_newest_mtime_wins_over_name() {
    common::setup();
    let root = TempDir::new().unwrap();

    // 文件名看起来更"新"，但 mtime 更早
    common::write_output(root.path(), "2024-05-01", "zz_9999.png");
    thread::sleep(Duration::from_millis(50));
    let newest = common::write_output(root.path(), "2024-05-01", "aa_0001.png");

    let after = SystemTime::now() - Duration::from_secs(10);
    assert_eq!(find_newest_output(root.path(), after), Some(newest));
}

#[test]
fn test_scan_spans_multiple_date_dirs() {
    common::setup();
    let root = TempDir::new().unwrap();

    common::write_output(root.path(), "2024-04-30", "a.png");
    thread::sleep(Duration::from_millis(50));
    let newest = common::write_output(root.path(), "2024-05-01", "b.png");

    let after = SystemTime::now() - Duration::from_secs(10);
    assert_eq!(find_newest_output(root.path(), after), Some(newest));
}

#[test]
fn test_scan_ignores_non_image_files() {
    common::setup();
    let root = TempDir::new().unwrap();
    common::write_output(root.path(), "2024-05-01", "metadata.json");
    common::write_output(root.path(), "2024-05-01", "log.txt");

    let after = SystemTime::now() - Duration::from_secs(10);
    assert_eq!(find_newest_output(root.path(), after), None);
}

#[test]
fn test_scan_ignores_top_level_files() {
    common::setup();
    let root = TempDir::new().unwrap();

    // 直接位于输出目录顶层的文件不在扫描范围内（只扫一层子目录）
    std::fs::write(root.path().join("stray.png"), b"x").unwrap();

    let after = SystemTime::now() - Duration::from_secs(10);
    assert_eq!(find_newest_output(root.path(), after), None);
}

#[test]
fn test_scan_missing_directory_is_empty() {
    common::setup();
    let after = SystemTime::now() - Duration::from_secs(10);
    assert_eq!(
        find_newest_output(Path::new("/nonexistent/fooocus/outputs"), after),
        None
    );
}

#[tokio::test]
async fn test_poll_returns_file_appearing_mid_poll() {
    common::setup();
    let root = TempDir::new().unwrap();
    let dir = root.path().to_path_buf();

    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        common::write_output(&dir, "2024-05-01", "late.png")
    });

    let after = SystemTime::now() - Duration::from_secs(1);
    let deadline = Instant::now() + Duration::from_secs(5);
    let found = poll_outputs(root.path(), after, deadline).await;

    let expected = writer.await.unwrap();
    assert_eq!(found, Some(expected));
}

#[tokio::test]
async fn test_poll_times_out_within_margin() {
    common::setup();
    let root = TempDir::new().unwrap();

    let timeout = Duration::from_secs(1);
    let started = std::time::Instant::now();
    let found = poll_outputs(
        root.path(),
        SystemTime::now(),
        Instant::now() + timeout,
    )
    .await;
    let elapsed = started.elapsed();

    assert_eq!(found, None);
    // 截止后最多再晚一个轮询间隔收尾
    assert!(elapsed >= timeout, "returned early: {:?}", elapsed);
    assert!(
        elapsed < timeout + Duration::from_millis(1500),
        "overshot deadline: {:?}",
        elapsed
    );
}
