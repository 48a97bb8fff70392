// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Block lookup for a single coordinate

use anyhow::Result;
use fieldcapture::catalog;
use fieldcapture::location::resolve_context;
use fieldcapture::types::{BlockRef, BlockSource, LocationSample};
use std::path::Path;

/// Resolve `lat`/`lon` against the block catalog at `blocks`
pub fn run(blocks: &Path, lat: f64, lon: f64, json: bool) -> Result<()> {
    let polygons = catalog::load_blocks(blocks)?;
    let sample = LocationSample::new(lat, lon);
    let hit = resolve_context(Some(&sample), &polygons)
        .map(|p| BlockRef::from_polygon(p, BlockSource::Auto));

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "block": hit }))?);
        return Ok(());
    }

    match hit {
        Some(block) => println!("Block: {} ({})", block.block_name, block.block_id),
        None => println!("No block contains {lat}, {lon}; choose one manually"),
    }
    Ok(())
}
