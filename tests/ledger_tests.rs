mod common;

use alist_sync::sync::ledger::{TransferLedger, DOWNLOAD_LEDGER_FILE};
use common::setup_temp_dir;
use std::fs;

#[test]
fn test_round_trip_preserves_membership() {
    let temp_dir = setup_temp_dir();
    let paths: Vec<String> = (0..50).rev().map(|i| format!("/data/dir{}/file{}.tif", i % 7, i)).collect();

    let mut ledger = TransferLedger::new();
    ledger.bind(temp_dir.path());
    for p in &paths {
        ledger.mark_done(p);
    }

    let mut reloaded = TransferLedger::new();
    reloaded.bind(temp_dir.path());
    assert_eq!(reloaded.len(), paths.len());
    for p in &paths {
        assert!(reloaded.contains(p), "missing {}", p);
    }
    assert!(!reloaded.contains("/data/dir0/other.tif"));
}

#[test]
fn test_persisted_document_shape() {
    let temp_dir = setup_temp_dir();
    let mut ledger = TransferLedger::new();
    ledger.bind(temp_dir.path());
    ledger.mark_done("/a/中文 名.txt");
    ledger.mark_done("/a/b.txt");

    let raw = fs::read_to_string(temp_dir.path().join(DOWNLOAD_LEDGER_FILE)).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let files = doc["downloaded_files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|v| v == "/a/中文 名.txt"));
    assert!(doc["last_update"].is_string());

    // 写入后不残留临时文件
    let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(leftovers, vec![DOWNLOAD_LEDGER_FILE.to_string()]);
}

#[test]
fn test_malformed_json_resets_to_empty() {
    let temp_dir = setup_temp_dir();
    fs::write(temp_dir.path().join(DOWNLOAD_LEDGER_FILE), "{ not json").unwrap();

    let mut ledger = TransferLedger::new();
    ledger.bind(temp_dir.path());
    assert!(ledger.is_empty());

    // 损坏的记录在下一次写入时被完整替换
    ledger.mark_done("/x.txt");
    let mut reloaded = TransferLedger::new();
    reloaded.bind(temp_dir.path());
    assert!(reloaded.contains("/x.txt"));
}

#[test]
fn test_clear_is_idempotent() {
    let temp_dir = setup_temp_dir();
    let mut ledger = TransferLedger::new();
    ledger.bind(temp_dir.path());
    ledger.clear().unwrap();

    ledger.mark_done("/x.txt");
    assert!(temp_dir.path().join(DOWNLOAD_LEDGER_FILE).exists());

    ledger.clear().unwrap();
    assert!(ledger.is_empty());
    assert!(!temp_dir.path().join(DOWNLOAD_LEDGER_FILE).exists());
    ledger.clear().unwrap();
}

#[test]
fn test_persist_failure_keeps_memory_state() {
    let temp_dir = setup_temp_dir();
    let missing_root = temp_dir.path().join("not-created");

    let mut ledger = TransferLedger::new();
    ledger.bind(&missing_root);
    ledger.mark_done("/x.txt");

    assert!(ledger.contains("/x.txt"));
    assert!(!missing_root.join(DOWNLOAD_LEDGER_FILE).exists());
}
