// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Fieldcapture library - the capture pipeline behind vineyard field forms
//!
//! This crate resolves a device location to the enclosing vineyard block,
//! stages attachments for a pending record, validates signed stock-ledger
//! adjustments, and composes the payloads handed to the record and movement
//! creation services.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attachments;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod error;
pub mod ledger;
pub mod location;
pub mod session;

/// Core data types shared by every stage of the capture pipeline
pub mod types {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::str::FromStr;
    use std::sync::Arc;

    // =========================================================================
    // Blocks and Location
    // =========================================================================

    /// A ring vertex as `(longitude, latitude)`
    pub type Vertex = (f64, f64);

    /// Managed land parcel ("block") boundary
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct BoundaryPolygon {
        /// Catalog identifier
        pub id: String,
        /// Display name
        pub name: String,
        /// Closed outer ring of `(longitude, latitude)` vertices
        pub ring: Vec<Vertex>,
        /// Grape variety planted in the block
        #[serde(default)]
        pub variety: Option<String>,
    }

    /// One-shot device position
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct LocationSample {
        /// Latitude in decimal degrees
        pub latitude: f64,
        /// Longitude in decimal degrees
        pub longitude: f64,
        /// Reported horizontal accuracy in metres, if any
        #[serde(default)]
        pub accuracy_m: Option<f64>,
    }

    impl LocationSample {
        /// Create a sample without accuracy information
        #[must_use]
        pub fn new(latitude: f64, longitude: f64) -> Self {
            Self { latitude, longitude, accuracy_m: None }
        }
    }

    /// How a block reference got onto a draft
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum BlockSource {
        /// Filled in from the location sample
        Auto,
        /// Picked explicitly by the user
        Manual,
    }

    /// Reference to the block a record belongs to
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BlockRef {
        /// Block identifier from the polygon catalog
        pub block_id: String,
        /// Block display name
        pub block_name: String,
        /// Whether it was resolved or chosen
        pub source: BlockSource,
    }

    impl BlockRef {
        /// Reference a polygon with the given source
        #[must_use]
        pub fn from_polygon(polygon: &BoundaryPolygon, source: BlockSource) -> Self {
            Self {
                block_id: polygon.id.clone(),
                block_name: polygon.name.clone(),
                source,
            }
        }
    }

    // =========================================================================
    // Attachments
    // =========================================================================

    /// Coarse MIME family of an attachment
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum MimeClass {
        /// `image/*`
        Image,
        /// `video/*`
        Video,
        /// `audio/*`
        Audio,
        /// PDF, text and office documents
        Document,
        /// Anything else
        Other,
    }

    impl MimeClass {
        /// Classify a MIME type string
        #[must_use]
        pub fn from_mime(mime: &str) -> Self {
            let mime = mime.trim().to_ascii_lowercase();
            let top = mime.split('/').next().unwrap_or_default();
            match top {
                "image" => Self::Image,
                "video" => Self::Video,
                "audio" => Self::Audio,
                "text" => Self::Document,
                "application"
                    if mime == "application/pdf"
                        || mime.contains("document")
                        || mime.contains("spreadsheet")
                        || mime.contains("msword")
                        || mime.contains("ms-excel") =>
                {
                    Self::Document
                }
                _ => Self::Other,
            }
        }
    }

    /// A file selected by the user, not yet staged
    #[derive(Debug, Clone)]
    pub struct PendingFile {
        /// Original file name
        pub name: String,
        /// Declared MIME type
        pub mime_type: String,
        /// File contents
        pub data: Arc<[u8]>,
    }

    impl PendingFile {
        /// Wrap file contents
        pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
            Self {
                name: name.into(),
                mime_type: mime_type.into(),
                data: data.into(),
            }
        }

        /// Size in bytes
        #[must_use]
        pub fn size(&self) -> u64 {
            self.data.len() as u64
        }
    }

    /// Session-local attachment identifier
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct AttachmentId(pub String);

    impl fmt::Display for AttachmentId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Preview lifecycle of a staged attachment
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum AttachmentState {
        /// Preview still being rendered
        Pending,
        /// Preview resolved, or none applicable
        Ready,
    }

    /// A file attached to a draft but not yet transmitted
    #[derive(Debug, Clone, Serialize)]
    pub struct StagedAttachment {
        /// Session-local identifier
        pub id: AttachmentId,
        /// Original file name
        pub name: String,
        /// Size in bytes
        pub size: u64,
        /// Declared MIME type
        pub mime_type: String,
        /// Coarse MIME family
        pub mime_class: MimeClass,
        /// Inline preview (`data:` URL) for images, once rendered
        pub preview: Option<String>,
        /// Preview lifecycle state
        pub state: AttachmentState,
        /// File contents
        #[serde(skip)]
        pub data: Arc<[u8]>,
    }

    // =========================================================================
    // Draft Records
    // =========================================================================

    /// Kind of field record being captured
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum RecordKind {
        /// Work item with a due date; requires a title
        #[default]
        Task,
        /// Field observation with an observed date; requires notes
        Observation,
    }

    impl FromStr for RecordKind {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "task" => Ok(Self::Task),
                "observation" | "obs" => Ok(Self::Observation),
                other => Err(format!("unknown record kind: {other}")),
            }
        }
    }

    /// Record priority
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Priority {
        /// Whenever convenient
        Low,
        /// Normal scheduling
        #[default]
        Medium,
        /// Ahead of normal work
        High,
        /// Drop everything
        Urgent,
    }

    impl FromStr for Priority {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "low" => Ok(Self::Low),
                "medium" | "normal" => Ok(Self::Medium),
                "high" => Ok(Self::High),
                "urgent" => Ok(Self::Urgent),
                other => Err(format!("unknown priority: {other}")),
            }
        }
    }

    /// In-memory record being edited in an open capture form
    #[derive(Debug, Clone, Default, PartialEq, Serialize)]
    pub struct DraftRecord {
        /// Task or observation
        pub kind: RecordKind,
        /// Short title (required for tasks)
        pub title: String,
        /// Free-text notes (required for observations)
        pub notes: String,
        /// Priority
        pub priority: Priority,
        /// Due date for tasks, observed date for observations
        pub date: Option<NaiveDate>,
        /// Block this record belongs to
        pub block: Option<BlockRef>,
    }

    // =========================================================================
    // Stock Ledger
    // =========================================================================

    /// Read-only stock snapshot of an inventory asset
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct AssetStockSnapshot {
        /// Asset identifier
        pub id: String,
        /// Display name
        #[serde(default)]
        pub name: String,
        /// Unit the stock is counted in (kg, L, units)
        pub unit_of_measure: String,
        /// Stock on hand when the snapshot was taken
        pub current_stock: Decimal,
        /// Reorder threshold
        #[serde(default)]
        pub minimum_stock: Decimal,
    }

    /// Direction of a stock adjustment
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Direction {
        /// Increase stock
        Add,
        /// Decrease stock
        Subtract,
    }

    impl FromStr for Direction {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "add" | "+" => Ok(Self::Add),
                "subtract" | "remove" | "-" => Ok(Self::Subtract),
                other => Err(format!("unknown direction: {other} (expected add or subtract)")),
            }
        }
    }

    /// Why stock is being adjusted
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(from = "String", into = "String")]
    pub enum MovementReason {
        /// Bought in
        Purchase,
        /// Consumed in field work
        Usage,
        /// Broken, spoiled or otherwise unusable
        Damaged,
        /// Count correction
        Correction,
        /// Stock found during a count
        Found,
        /// Returned by a crew or supplier
        Returned,
        /// Moved between stores
        Transfer,
        /// Free-form reason
        Other(String),
    }

    impl MovementReason {
        /// Wire name of the reason
        #[must_use]
        pub fn as_str(&self) -> &str {
            match self {
                Self::Purchase => "purchase",
                Self::Usage => "usage",
                Self::Damaged => "damaged",
                Self::Correction => "correction",
                Self::Found => "found",
                Self::Returned => "returned",
                Self::Transfer => "transfer",
                Self::Other(s) => s,
            }
        }
    }

    impl From<&str> for MovementReason {
        fn from(s: &str) -> Self {
            match s.trim().to_ascii_lowercase().as_str() {
                "purchase" => Self::Purchase,
                "usage" => Self::Usage,
                "damaged" => Self::Damaged,
                "correction" => Self::Correction,
                "found" => Self::Found,
                "returned" => Self::Returned,
                "transfer" => Self::Transfer,
                _ => Self::Other(s.trim().to_string()),
            }
        }
    }

    impl From<String> for MovementReason {
        fn from(s: String) -> Self {
            Self::from(s.as_str())
        }
    }

    impl From<MovementReason> for String {
        fn from(reason: MovementReason) -> Self {
            reason.as_str().to_string()
        }
    }

    impl fmt::Display for MovementReason {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Ledger category derived from direction and reason
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum MovementType {
        /// Stock bought in
        Purchase,
        /// Stock consumed
        Usage,
        /// Stock written off as damaged
        Disposal,
        /// Everything else
        Adjustment,
    }

    /// Proposed stock adjustment being edited
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct StockMovementDraft {
        /// Asset being adjusted; `None` until the user picks one
        pub asset_id: Option<String>,
        /// Add or subtract
        pub direction: Direction,
        /// Unsigned amount
        pub magnitude: Decimal,
        /// Why the stock changes
        pub reason: MovementReason,
        /// Date of the movement
        pub date: NaiveDate,
        /// Free-text note
        pub note: Option<String>,
    }

    impl StockMovementDraft {
        /// Signed delta this draft applies to the asset's stock
        #[must_use]
        pub fn signed_quantity(&self) -> Decimal {
            crate::ledger::compute_delta(self.direction, self.magnitude)
        }

        /// Ledger category of this draft
        #[must_use]
        pub fn movement_type(&self) -> MovementType {
            crate::ledger::classify(self.direction, &self.reason)
        }
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{CaptureError, SubmissionError, ValidationError};
    pub use crate::types::*;
    pub use anyhow::{Context, Result};
}
