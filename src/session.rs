// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Capture sessions
//!
//! A session is opened when a capture form opens and owns everything the
//! form edits: the draft record, its staged attachments and the pending
//! location request. The block and asset catalogs are shared read-only.
//! Closing the session, or a successful submit, discards all of it; a failed
//! submit hands the session back untouched so the user can retry.

use crate::attachments::{AttachmentStager, PreviewRenderer};
use crate::catalog::{AssetCatalog, PolygonCatalog};
use crate::compose::{self, MovementPayload, RecordPayload};
use crate::config::Config;
use crate::error::{CaptureError, SubmissionError, ValidationError};
use crate::ledger::{self, StockPreview, ValidatedMovement};
use crate::location::{BlockIndex, GeolocationProvider, LocationFetch};
use crate::types::{
    AssetStockSnapshot, AttachmentId, BlockRef, BlockSource, DraftRecord, LocationSample,
    PendingFile, Priority, RecordKind, StagedAttachment, StockMovementDraft,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// =============================================================================
// External collaborators
// =============================================================================

/// Record returned by the creation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    /// Server-assigned id
    pub id: String,
    /// Task or observation
    pub kind: RecordKind,
}

/// Ledger entry returned by the movement service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Server-assigned id
    pub id: String,
    /// Authoritative stock after the movement, if reported
    #[serde(default)]
    pub resulting_stock: Option<Decimal>,
}

/// Creates records from composed payloads
#[async_trait]
pub trait RecordCreationApi: Send + Sync {
    /// Create the record
    async fn create_record(&self, payload: &RecordPayload) -> anyhow::Result<CreatedRecord>;
}

/// Creates ledger entries from composed movement payloads
#[async_trait]
pub trait MovementCreationApi: Send + Sync {
    /// Record the movement
    async fn create_movement(&self, payload: &MovementPayload) -> anyhow::Result<LedgerEntry>;
}

/// Notifications back to the parent UI
pub trait CaptureObserver: Send + Sync {
    /// A submit was started with this draft
    fn on_submit(&self, _draft: &DraftRecord) {}
    /// The record was created
    fn on_success(&self, _record: &CreatedRecord) {}
    /// The form was closed without submitting
    fn on_close(&self) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CaptureObserver for NoopObserver {}

/// A submit that did not go through.
///
/// Carries the session back so the draft and attachments can be resent as
/// a whole.
pub struct Rejected<S> {
    /// The untouched session
    pub session: S,
    /// Why the submit failed
    pub error: CaptureError,
}

impl<S> fmt::Debug for Rejected<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish_non_exhaustive()
    }
}

impl<S> fmt::Display for Rejected<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

fn new_session_id() -> String {
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(Utc::now().to_rfc3339().as_bytes());
    hasher.update(seq.to_be_bytes());
    hasher.update(std::process::id().to_be_bytes());
    let hash = hex::encode(hasher.finalize());
    format!("cap:{}", &hash[..12])
}

// =============================================================================
// Record capture
// =============================================================================

/// One open record capture form
pub struct CaptureSession {
    id: String,
    blocks: BlockIndex,
    draft: DraftRecord,
    stager: AttachmentStager,
    location: Option<LocationFetch>,
    sample: Option<LocationSample>,
    observer: Arc<dyn CaptureObserver>,
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("draft", &self.draft)
            .field("stager", &self.stager)
            .field("location_pending", &self.location_pending())
            .finish_non_exhaustive()
    }
}

impl CaptureSession {
    /// Open a capture form over a block catalog
    #[must_use]
    pub fn open(blocks: BlockIndex, config: &Config) -> Self {
        let id = new_session_id();
        let mut stager = AttachmentStager::new(id.clone()).with_limit(config.effective_attachment_limit());
        if !config.previews {
            stager = stager.without_previews();
        }
        tracing::debug!(session = %id, blocks = blocks.polygons().len(), "capture session opened");
        Self {
            id,
            blocks,
            draft: DraftRecord::default(),
            stager,
            location: None,
            sample: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Open a capture form over the blocks served by `catalog`
    pub async fn from_catalog(catalog: &dyn PolygonCatalog, config: &Config) -> anyhow::Result<Self> {
        let blocks = catalog.blocks().await?;
        Ok(Self::open(BlockIndex::new(blocks.into()), config))
    }

    /// Report lifecycle events to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CaptureObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Render attachment previews with `renderer`.
    ///
    /// Ignored when previews are switched off in the configuration. Files
    /// already staged stay staged.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn PreviewRenderer>) -> Self {
        if self.stager.previews_enabled() {
            self.stager.set_renderer(Some(renderer));
        } else {
            tracing::debug!(session = %self.id, "previews disabled; renderer ignored");
        }
        self
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current draft
    #[must_use]
    pub fn draft(&self) -> &DraftRecord {
        &self.draft
    }

    /// The block catalog
    #[must_use]
    pub fn blocks(&self) -> &BlockIndex {
        &self.blocks
    }

    /// Set task or observation
    pub fn set_kind(&mut self, kind: RecordKind) {
        self.draft.kind = kind;
    }

    /// Set the title
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    /// Set the notes
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.draft.notes = notes.into();
    }

    /// Set the priority
    pub fn set_priority(&mut self, priority: Priority) {
        self.draft.priority = priority;
    }

    /// Set the due or observed date
    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.draft.date = date;
    }

    /// Pick a block by hand. Returns `false` and leaves the draft alone if
    /// the id is not in the catalog.
    pub fn select_block(&mut self, block_id: &str) -> bool {
        match self.blocks.get(block_id) {
            Some(polygon) => {
                self.draft.block = Some(BlockRef::from_polygon(polygon, BlockSource::Manual));
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Location
    // -------------------------------------------------------------------------

    /// Ask the platform for a position. The form stays usable while the
    /// request is pending; there is no timeout.
    pub fn request_location(&mut self, provider: Arc<dyn GeolocationProvider>) {
        if let Some(previous) = self.location.replace(LocationFetch::spawn(provider)) {
            previous.cancel();
        }
    }

    /// Whether a location request is still outstanding
    #[must_use]
    pub fn location_pending(&self) -> bool {
        self.location.is_some()
    }

    /// The location sample, once one has arrived
    #[must_use]
    pub fn location(&self) -> Option<&LocationSample> {
        self.sample.as_ref()
    }

    /// Apply the location answer if it has arrived
    pub fn poll_location(&mut self) -> Option<&BlockRef> {
        if let Some(fetch) = self.location.as_mut() {
            if let Some(sample) = fetch.try_take() {
                self.location = None;
                self.apply_location(sample);
            }
        }
        self.draft.block.as_ref()
    }

    /// Wait for the location answer and apply it
    pub async fn await_location(&mut self) -> Option<&BlockRef> {
        if let Some(fetch) = self.location.take() {
            let sample = fetch.wait().await;
            self.apply_location(sample);
        }
        self.draft.block.as_ref()
    }

    /// Pre-fill the block from a sample.
    ///
    /// A manual choice is never replaced and a miss never clears anything.
    pub fn apply_location(&mut self, sample: Option<LocationSample>) {
        let Some(sample) = sample else {
            tracing::debug!(session = %self.id, "no location available; manual block selection required");
            return;
        };
        self.sample = Some(sample);

        if matches!(&self.draft.block, Some(b) if b.source == BlockSource::Manual) {
            tracing::debug!(session = %self.id, "block already chosen by hand; location ignored");
            return;
        }
        if let Some(polygon) = self.blocks.resolve(Some(&sample)) {
            self.draft.block = Some(BlockRef::from_polygon(polygon, BlockSource::Auto));
        }
    }

    // -------------------------------------------------------------------------
    // Attachments
    // -------------------------------------------------------------------------

    /// Stage a batch of files; all or nothing
    pub fn add_attachments(&mut self, files: Vec<PendingFile>) -> Result<Vec<StagedAttachment>, ValidationError> {
        self.stager.add(files)
    }

    /// Unstage a file
    pub fn remove_attachment(&mut self, id: &AttachmentId) -> bool {
        self.stager.remove(id)
    }

    /// Staged files in order
    #[must_use]
    pub fn attachments(&self) -> Vec<StagedAttachment> {
        self.stager.list()
    }

    /// Wait for outstanding previews
    pub async fn settle_previews(&mut self) {
        self.stager.settle().await;
    }

    // -------------------------------------------------------------------------
    // Submission
    // -------------------------------------------------------------------------

    /// Compose the record payload with the attachments as staged right now
    pub fn compose(&self) -> Result<RecordPayload, ValidationError> {
        compose::compose(&self.draft, &self.stager.list())
    }

    /// Whether the draft is complete enough to submit
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.compose().is_ok()
    }

    /// Validate, compose and send the record.
    ///
    /// Validation failures never reach `api`. On any failure the session is
    /// handed back unchanged.
    pub async fn submit(self, api: &dyn RecordCreationApi) -> Result<CreatedRecord, Rejected<Self>> {
        self.observer.on_submit(&self.draft);

        let payload = match self.compose() {
            Ok(p) => p,
            Err(e) => return Err(Rejected { session: self, error: e.into() }),
        };

        match api.create_record(&payload).await {
            Ok(record) => {
                tracing::info!(session = %self.id, record = %record.id, attachments = payload.attachments.len(), "record created");
                self.observer.on_success(&record);
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %format!("{e:#}"), "record creation failed");
                Err(Rejected {
                    session: self,
                    error: CaptureError::Submission(SubmissionError::Record(e)),
                })
            }
        }
    }

    /// Close the form and discard the draft
    pub fn close(mut self) {
        if let Some(fetch) = self.location.take() {
            fetch.cancel();
        }
        self.stager.clear();
        tracing::debug!(session = %self.id, "capture session closed");
        self.observer.on_close();
    }
}

// =============================================================================
// Stock adjustment
// =============================================================================

/// One open stock adjustment form
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    assets: Arc<[AssetStockSnapshot]>,
    draft: StockMovementDraft,
}

impl StockAdjustment {
    /// Open a blank adjustment dated `date`
    #[must_use]
    pub fn open(assets: Arc<[AssetStockSnapshot]>, date: NaiveDate) -> Self {
        Self {
            assets,
            draft: StockMovementDraft {
                asset_id: None,
                direction: crate::types::Direction::Subtract,
                magnitude: Decimal::ZERO,
                reason: crate::types::MovementReason::Usage,
                date,
                note: None,
            },
        }
    }

    /// Open a blank adjustment over the assets served by `catalog`
    pub async fn from_catalog(catalog: &dyn AssetCatalog, date: NaiveDate) -> anyhow::Result<Self> {
        let assets = catalog.assets().await?;
        Ok(Self::open(assets.into(), date))
    }

    /// Current draft
    #[must_use]
    pub fn draft(&self) -> &StockMovementDraft {
        &self.draft
    }

    /// Edit the draft
    pub fn draft_mut(&mut self) -> &mut StockMovementDraft {
        &mut self.draft
    }

    /// The selected asset, if it is in the snapshot
    #[must_use]
    pub fn asset(&self) -> Option<&AssetStockSnapshot> {
        ledger::resolve_asset(&self.draft, &self.assets).ok()
    }

    /// Before/after figures; available whenever an asset is selected
    #[must_use]
    pub fn preview(&self) -> Option<StockPreview> {
        self.asset().map(|a| ledger::preview_for(a, self.draft.signed_quantity()))
    }

    /// Run the ledger gates
    pub fn validate(&self) -> Result<ValidatedMovement, ValidationError> {
        ledger::validate_movement(&self.draft, &self.assets)
    }

    /// Whether the adjustment may be submitted
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate, compose and send the movement
    pub async fn submit(self, api: &dyn MovementCreationApi) -> Result<LedgerEntry, Rejected<Self>> {
        let validated = match self.validate() {
            Ok(v) => v,
            Err(e) => return Err(Rejected { session: self, error: e.into() }),
        };
        let payload = compose::compose_movement(&validated);

        match api.create_movement(&payload).await {
            Ok(entry) => {
                tracing::info!(asset = %payload.asset_id, entry = %entry.id, quantity = %payload.quantity, "stock movement recorded");
                Ok(entry)
            }
            Err(e) => {
                tracing::warn!(asset = %payload.asset_id, error = %format!("{e:#}"), "stock movement failed");
                Err(Rejected {
                    session: self,
                    error: CaptureError::Submission(SubmissionError::Movement(e)),
                })
            }
        }
    }
}
