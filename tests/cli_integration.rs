// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Integration tests for the fieldcapture CLI commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const BLOCKS: &str = r#"{
    "blocks": [
        {"id": "blk-a", "name": "North Chardonnay", "ring": [[0,0],[10,0],[10,10],[0,10]], "variety": "Chardonnay"},
        {"id": "blk-b", "name": "South Pinot", "ring": [[5,5],[15,5],[15,15],[5,15]]}
    ]
}"#;

const ASSETS: &str = r#"{
    "assets": [
        {"id": "asset-sulfur", "name": "Wettable sulfur", "unit_of_measure": "kg", "current_stock": "10", "minimum_stock": "3"}
    ]
}"#;

/// Write the catalogs into a fresh directory
fn workspace() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let blocks = dir.path().join("blocks.json");
    let assets = dir.path().join("assets.json");
    std::fs::write(&blocks, BLOCKS).unwrap();
    std::fs::write(&assets, ASSETS).unwrap();
    (dir, blocks, assets)
}

/// fieldcapture isolated from the user's config
fn fieldcapture(dir: &TempDir) -> Command {
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "").unwrap();
    let mut cmd = Command::cargo_bin("fieldcapture").unwrap();
    cmd.env("FIELDCAPTURE_CONFIG", &config).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_resolve_overlap_prefers_first_block() {
    let (dir, blocks, _) = workspace();
    fieldcapture(&dir)
        .args(["resolve", "--catalog"])
        .arg(&blocks)
        .args(["--lat", "7", "--lon", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("North Chardonnay (blk-a)"));
}

#[test]
fn test_resolve_miss_asks_for_manual_choice() {
    let (dir, blocks, _) = workspace();
    fieldcapture(&dir)
        .args(["--json", "resolve", "--catalog"])
        .arg(&blocks)
        .args(["--lat", "-40", "--lon", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"block\": null"));
}

#[test]
fn test_movement_insufficient_stock_fails() {
    let (dir, _, assets) = workspace();
    fieldcapture(&dir)
        .args(["movement", "--assets"])
        .arg(&assets)
        .args(["--asset", "asset-sulfur", "--direction", "subtract", "--magnitude", "12"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("10.00 -12.00 -> -2.00"))
        .stderr(predicate::str::contains("Not enough stock"));
}

#[test]
fn test_movement_payload_with_default_note() {
    let (dir, _, assets) = workspace();
    fieldcapture(&dir)
        .args(["--json", "movement", "--assets"])
        .arg(&assets)
        .args([
            "--asset", "asset-sulfur",
            "--direction", "subtract",
            "--magnitude", "8",
            "--reason", "usage",
            "--date", "2025-03-14",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"movement_type\": \"usage\""))
        .stdout(predicate::str::contains("\"notes\": \"Quick adjustment: usage\""))
        .stdout(predicate::str::contains("\"date\": \"2025-03-14\""));
}

#[test]
fn test_movement_zero_quantity_fails() {
    let (dir, _, assets) = workspace();
    fieldcapture(&dir)
        .args(["movement", "--assets"])
        .arg(&assets)
        .args(["--asset", "asset-sulfur", "--direction", "add", "--magnitude", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("non-zero"));
}

#[test]
fn test_movement_beyond_decimal_range_is_rejected() {
    let (dir, _, assets) = workspace();
    fieldcapture(&dir)
        .args(["movement", "--assets"])
        .arg(&assets)
        .args([
            "--asset", "asset-sulfur",
            "--direction", "add",
            "--magnitude", "79228162514264337593543950335",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("-> out of range"))
        .stderr(predicate::str::contains("Quantity is out of range"));
}

#[test]
fn test_compose_resolves_block_from_location() {
    let (dir, blocks, _) = workspace();
    fieldcapture(&dir)
        .args(["--json", "compose", "--catalog"])
        .arg(&blocks)
        .args(["--title", "Fix trellis wire", "--lat", "7", "--lon", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"block_id\": \"blk-a\""))
        .stdout(predicate::str::contains("\"block_source\": \"auto\""));
}

#[test]
fn test_compose_manual_block_wins() {
    let (dir, blocks, _) = workspace();
    fieldcapture(&dir)
        .args(["--json", "compose", "--catalog"])
        .arg(&blocks)
        .args(["--title", "Fix trellis wire", "--lat", "7", "--lon", "7", "--block", "blk-b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"block_id\": \"blk-b\""))
        .stdout(predicate::str::contains("\"block_source\": \"manual\""));
}

#[test]
fn test_compose_without_block_is_rejected() {
    let (dir, blocks, _) = workspace();
    fieldcapture(&dir)
        .args(["compose", "--catalog"])
        .arg(&blocks)
        .args(["--title", "Spray row 9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("block"));
}

#[test]
fn test_compose_with_attachments() {
    let (dir, blocks, _) = workspace();
    let photo = dir.path().join("leaf.png");
    let note = dir.path().join("count.txt");
    std::fs::write(&photo, b"not really a png").unwrap();
    std::fs::write(&note, b"42 bunches").unwrap();

    fieldcapture(&dir)
        .args(["compose", "--catalog"])
        .arg(&blocks)
        .args(["--kind", "observation", "--notes", "Downy mildew", "--block", "blk-a", "--attach"])
        .arg(&photo)
        .arg("--attach")
        .arg(&note)
        .assert()
        .success()
        .stdout(predicate::str::contains("leaf.png [image/png]"))
        .stdout(predicate::str::contains("count.txt [text/plain] 10 bytes"));
}

#[test]
fn test_compose_attachment_over_limit_rejects_batch() {
    let (dir, blocks, _) = workspace();
    let config = dir.path().join("small.toml");
    std::fs::write(&config, "attachment_limit_bytes = 4\n").unwrap();
    let big = dir.path().join("big.txt");
    std::fs::write(&big, b"0123456789").unwrap();

    fieldcapture(&dir)
        .env("FIELDCAPTURE_CONFIG", &config)
        .args(["compose", "--catalog"])
        .arg(&blocks)
        .args(["--title", "Broken post", "--block", "blk-a", "--attach"])
        .arg(&big)
        .assert()
        .failure()
        .stderr(predicate::str::contains("over the 4 byte attachment limit"));
}

#[test]
fn test_config_prints_effective_values() {
    let (dir, _, _) = workspace();
    fieldcapture(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("attachment_limit_bytes = 10485760"));

    fieldcapture(&dir)
        .args(["config", "previews"])
        .assert()
        .success()
        .stdout("true\n");
}

#[test]
fn test_completions_generate() {
    let (dir, _, _) = workspace();
    fieldcapture(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fieldcapture"));
}
