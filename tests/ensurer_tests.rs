mod common;

use alist_sync::sync::ensurer::{DirectoryEnsurer, Presence};
use alist_sync::sync::SyncError;
use common::MockRemote;
use std::time::Duration;

fn ensurer(remote: &MockRemote) -> DirectoryEnsurer<'_> {
    DirectoryEnsurer::new(remote).with_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn test_root_is_trivially_present() {
    let remote = MockRemote::new();
    ensurer(&remote).ensure("/").await.unwrap();
    ensurer(&remote).ensure("").await.unwrap();
    ensurer(&remote).force("/").await.unwrap();
    assert!(remote.mkdirs().is_empty());
    assert!(remote.lists().is_empty());
}

#[tokio::test]
async fn test_creates_missing_ancestors_top_down() {
    let remote = MockRemote::new();
    ensurer(&remote).ensure("/x/y/z").await.unwrap();

    assert_eq!(remote.mkdirs(), vec!["/x", "/x/y", "/x/y/z"]);
    // 每一级都先检查是否存在
    assert_eq!(remote.lists()[..3], ["/x/y", "/x", "/"]);
    assert!(remote.has_dir("/x/y/z"));
}

#[tokio::test]
async fn test_existing_directory_needs_no_creation() {
    let remote = MockRemote::new();
    remote.add_dir("/x/y");
    remote.add_dir("/x");

    ensurer(&remote).ensure("/x/y").await.unwrap();
    assert!(remote.mkdirs().is_empty());

    ensurer(&remote).ensure("/x/y/new").await.unwrap();
    assert_eq!(remote.mkdirs(), vec!["/x/y/new"]);
}

#[tokio::test]
async fn test_file_in_the_way_is_a_conflict() {
    let remote = MockRemote::new();
    remote.add_dir("/x");
    remote.add_file("/x/y", 12);

    let err = ensurer(&remote).ensure("/x/y/z").await.unwrap_err();
    assert!(err.is_conflict());
    match err {
        SyncError::Conflict { path } => assert_eq!(path, "/x/y"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(remote.mkdirs().is_empty());
}

#[tokio::test]
async fn test_transient_race_is_rechecked() {
    let remote = MockRemote::new();
    remote.fail_mkdir("/busy", "object is being written by another request", 1);
    remote.created_concurrently("/busy");

    ensurer(&remote).ensure("/busy").await.unwrap();
    assert_eq!(remote.mkdirs(), vec!["/busy"]);
}

#[tokio::test]
async fn test_persistent_failure_is_reported_with_path() {
    let remote = MockRemote::new();
    remote.fail_mkdir("/locked", "permission denied", 5);

    let err = ensurer(&remote).ensure("/locked").await.unwrap_err();
    match err {
        SyncError::Mkdir { path, message } => {
            assert_eq!(path, "/locked");
            assert_eq!(message, "permission denied");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_transient_failure_that_never_resolves() {
    let remote = MockRemote::new();
    remote.fail_mkdir("/slow", "resource busy, try again", 5);

    let err = ensurer(&remote).ensure("/slow").await.unwrap_err();
    assert!(matches!(err, SyncError::Mkdir { .. }));
    // 只重新确认一次，不会无限重试
    assert_eq!(remote.mkdirs(), vec!["/slow"]);
}

#[tokio::test]
async fn test_force_creates_whole_path_in_one_call() {
    let remote = MockRemote::new();
    ensurer(&remote).force("/a/b/c").await.unwrap();
    assert_eq!(remote.mkdirs(), vec!["/a/b/c"]);
}

#[tokio::test]
async fn test_force_reports_blocked_segment() {
    let remote = MockRemote::new();
    remote.fail_mkdir("/a/b/c", "storage not found", 1);
    remote.fail_mkdir("/a/b", "quota exceeded", 5);

    let err = ensurer(&remote).force("/a/b/c").await.unwrap_err();
    match err {
        SyncError::BlockedSegment {
            path,
            segment,
            message,
        } => {
            assert_eq!(path, "/a/b/c");
            assert_eq!(segment, "/a/b");
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(remote.mkdirs(), vec!["/a/b/c", "/a", "/a/b"]);
}

#[tokio::test]
async fn test_probe_distinguishes_types() {
    let remote = MockRemote::new();
    remote.add_dir("/d");
    remote.add_file("/d/f.txt", 1);

    let ensurer = ensurer(&remote);
    assert_eq!(ensurer.probe("/d").await, Presence::Directory);
    assert_eq!(ensurer.probe("/d/f.txt").await, Presence::File);
    assert_eq!(ensurer.probe("/d/none").await, Presence::Absent);
    assert_eq!(ensurer.probe("/").await, Presence::Directory);
}
