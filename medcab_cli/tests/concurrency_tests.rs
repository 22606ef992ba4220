//! Concurrency tests for the medcab binary.
//!
//! These tests verify that several processes working on one data directory:
//! - Never lose a dose decrement
//! - Deduct a scheduled window only once
//! - Journal exactly one event per quantity change

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("medcab"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn init_demo(data_dir: &Path) {
    cli()
        .args(["init", "--demo", "--role", "pharmacist", "--data-dir"])
        .arg(data_dir)
        .assert()
        .success();
}

fn read_store(data_dir: &Path) -> serde_json::Value {
    let contents = fs::read_to_string(data_dir.join("store.json")).expect("Failed to read store");
    serde_json::from_str(&contents).expect("Invalid store JSON")
}

/// (item id, qty) of the order item for `medicine_name`
fn item_for(data_dir: &Path, medicine_name: &str) -> (String, u64) {
    let store = read_store(data_dir);
    let item = store["order_items"]
        .as_array()
        .expect("order_items array")
        .iter()
        .find(|i| i["medicine"]["name"] == medicine_name)
        .expect("item for medicine")
        .clone();
    (
        item["id"].as_str().expect("item id").to_string(),
        item["qty"].as_u64().expect("item qty"),
    )
}

fn journal_lines(data_dir: &Path) -> usize {
    fs::read_to_string(data_dir.join("wal/dose_events.wal"))
        .map(|wal| wal.lines().count())
        .unwrap_or(0)
}

#[test]
fn test_concurrent_takes_all_decrement() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    init_demo(&data_dir);
    let (item, start_qty) = item_for(&data_dir, "Ibuprofen");
    assert_eq!(start_qty, 10);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let data_dir: PathBuf = data_dir.clone();
            let item = item.clone();
            thread::spawn(move || {
                cli()
                    .args(["take", "--patient", "demo_patient", "--item", item.as_str()])
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .output()
                    .expect("Failed to run take")
                    .status
                    .success()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("take thread panicked"))
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 10, "Every take should succeed");
    assert_eq!(item_for(&data_dir, "Ibuprofen").1, 0);
    assert_eq!(journal_lines(&data_dir), 10);
}

#[test]
fn test_takes_beyond_stock_are_refused() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    init_demo(&data_dir);
    let (item, _) = item_for(&data_dir, "Ibuprofen");

    let handles: Vec<_> = (0..14)
        .map(|_| {
            let data_dir = data_dir.clone();
            let item = item.clone();
            thread::spawn(move || {
                cli()
                    .args(["take", "--patient", "demo_patient", "--item", item.as_str()])
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .output()
                    .expect("Failed to run take")
                    .status
                    .success()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("take thread panicked"))
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 10);
    assert_eq!(item_for(&data_dir, "Ibuprofen").1, 0);
    assert_eq!(journal_lines(&data_dir), 10);
}

#[test]
fn test_concurrent_ticks_deduct_window_once() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    init_demo(&data_dir);

    // 02:30 UTC is the 08:00 window at +05:30
    let handles: Vec<_> = (0..5)
        .map(|_| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                cli()
                    .args(["tick", "--at", "2024-05-01T02:30:00Z", "--role", "pharmacist"])
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .assert()
                    .success();
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("tick thread panicked");
    }

    assert_eq!(item_for(&data_dir, "Paracetamol").1, 14);
    assert_eq!(item_for(&data_dir, "Cetirizine").1, 9);
    assert_eq!(journal_lines(&data_dir), 2);
}

#[test]
fn test_rollup_during_takes_keeps_every_event() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    init_demo(&data_dir);
    let (item, _) = item_for(&data_dir, "Ibuprofen");

    let takers: Vec<_> = (0..6)
        .map(|_| {
            let data_dir = data_dir.clone();
            let item = item.clone();
            thread::spawn(move || {
                cli()
                    .args(["take", "--patient", "demo_patient", "--item", item.as_str()])
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .assert()
                    .success();
            })
        })
        .collect();

    let roller = {
        let data_dir = data_dir.clone();
        thread::spawn(move || {
            cli()
                .args(["rollup", "--role", "pharmacist", "--data-dir"])
                .arg(&data_dir)
                .assert()
                .success();
        })
    };

    for handle in takers {
        handle.join().expect("take thread panicked");
    }
    roller.join().expect("rollup thread panicked");

    let archived = match fs::read_to_string(data_dir.join("dose_history.csv")) {
        Ok(csv) => csv.lines().count().saturating_sub(1),
        Err(_) => 0,
    };
    assert_eq!(archived + journal_lines(&data_dir), 6);
    assert_eq!(item_for(&data_dir, "Ibuprofen").1, 4);
}
