// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Read-only catalogs supplied to a capture session

use crate::types::{AssetStockSnapshot, BoundaryPolygon};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Ordered block boundaries for the current property
#[async_trait]
pub trait PolygonCatalog: Send + Sync {
    /// Blocks in catalog order
    async fn blocks(&self) -> Result<Vec<BoundaryPolygon>>;
}

/// Stock snapshot of inventory assets
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Assets with their current stock
    async fn assets(&self) -> Result<Vec<AssetStockSnapshot>>;
}

/// On-disk polygon catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockFile {
    /// Blocks in catalog order
    #[serde(default)]
    pub blocks: Vec<BoundaryPolygon>,
}

/// On-disk asset catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetFile {
    /// Asset snapshots
    #[serde(default)]
    pub assets: Vec<AssetStockSnapshot>,
}

/// Parse a polygon catalog from JSON
pub fn parse_blocks(json: &str) -> Result<Vec<BoundaryPolygon>> {
    let file: BlockFile = serde_json::from_str(json).context("Failed to parse block catalog")?;
    let mut seen = HashSet::new();
    for block in &file.blocks {
        if !seen.insert(block.id.as_str()) {
            tracing::warn!(block = %block.id, "duplicate block id; the first listed wins");
        }
        if block.ring.len() < 3 {
            tracing::warn!(block = %block.id, vertices = block.ring.len(), "block ring too short to contain anything");
        }
    }
    Ok(file.blocks)
}

/// Parse an asset catalog from JSON
pub fn parse_assets(json: &str) -> Result<Vec<AssetStockSnapshot>> {
    let file: AssetFile = serde_json::from_str(json).context("Failed to parse asset catalog")?;
    Ok(file.assets)
}

/// Load a polygon catalog file
pub fn load_blocks(path: &Path) -> Result<Vec<BoundaryPolygon>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_blocks(&content).with_context(|| format!("Invalid block catalog {}", path.display()))
}

/// Load an asset catalog file
pub fn load_assets(path: &Path) -> Result<Vec<AssetStockSnapshot>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_assets(&content).with_context(|| format!("Invalid asset catalog {}", path.display()))
}

/// In-memory catalog serving fixed data
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    blocks: Arc<[BoundaryPolygon]>,
    assets: Arc<[AssetStockSnapshot]>,
}

impl StaticCatalog {
    /// Serve the given blocks and assets
    #[must_use]
    pub fn new(blocks: Vec<BoundaryPolygon>, assets: Vec<AssetStockSnapshot>) -> Self {
        Self { blocks: blocks.into(), assets: assets.into() }
    }
}

#[async_trait]
impl PolygonCatalog for StaticCatalog {
    async fn blocks(&self) -> Result<Vec<BoundaryPolygon>> {
        Ok(self.blocks.to_vec())
    }
}

#[async_trait]
impl AssetCatalog for StaticCatalog {
    async fn assets(&self) -> Result<Vec<AssetStockSnapshot>> {
        Ok(self.assets.to_vec())
    }
}
