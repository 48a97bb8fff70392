// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Payload composition for the creation services
//!
//! Composition is local and synchronous: it either yields a payload or a
//! [`ValidationError`] before anything is sent.

use crate::error::ValidationError;
use crate::ledger::ValidatedMovement;
use crate::types::{
    AttachmentId, BlockSource, DraftRecord, MimeClass, MovementType, Priority, RecordKind,
    StagedAttachment,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Attachment as sent with a record
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentPayload {
    /// Session-local id
    pub id: AttachmentId,
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Declared MIME type
    pub mime_type: String,
    /// Coarse MIME family
    pub mime_class: MimeClass,
    /// File contents
    #[serde(skip)]
    pub data: Arc<[u8]>,
}

impl From<&StagedAttachment> for AttachmentPayload {
    fn from(a: &StagedAttachment) -> Self {
        Self {
            id: a.id.clone(),
            name: a.name.clone(),
            size: a.size,
            mime_type: a.mime_type.clone(),
            mime_class: a.mime_class,
            data: Arc::clone(&a.data),
        }
    }
}

/// Request body for the record creation service
#[derive(Debug, Clone, Serialize)]
pub struct RecordPayload {
    /// Task or observation
    pub kind: RecordKind,
    /// Title, trimmed
    pub title: String,
    /// Notes, trimmed
    pub notes: String,
    /// Priority
    pub priority: Priority,
    /// Due or observed date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Block the record belongs to
    pub block_id: String,
    /// Whether the block was resolved or chosen
    pub block_source: BlockSource,
    /// Attachments in staging order
    pub attachments: Vec<AttachmentPayload>,
}

/// Build a record payload from a draft and its staged attachments.
///
/// Tasks need a title and observations need notes; both need a block.
/// Previews are not part of the payload, so pending previews never hold
/// up composition.
pub fn compose(draft: &DraftRecord, attachments: &[StagedAttachment]) -> Result<RecordPayload, ValidationError> {
    let title = draft.title.trim();
    let notes = draft.notes.trim();

    match draft.kind {
        RecordKind::Task if title.is_empty() => {
            return Err(ValidationError::MissingRequiredField("title"));
        }
        RecordKind::Observation if notes.is_empty() => {
            return Err(ValidationError::MissingRequiredField("notes"));
        }
        _ => {}
    }

    let block = draft
        .block
        .as_ref()
        .ok_or(ValidationError::MissingRequiredField("block"))?;

    Ok(RecordPayload {
        kind: draft.kind,
        title: title.to_string(),
        notes: notes.to_string(),
        priority: draft.priority,
        date: draft.date,
        block_id: block.block_id.clone(),
        block_source: block.source,
        attachments: attachments.iter().map(AttachmentPayload::from).collect(),
    })
}

/// Request body for the movement creation service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementPayload {
    /// Asset being adjusted
    pub asset_id: String,
    /// Ledger category
    pub movement_type: MovementType,
    /// Signed quantity
    pub quantity: Decimal,
    /// Unit of the quantity
    pub unit_of_measure: String,
    /// Reason as entered
    pub reason: String,
    /// Movement date
    pub date: NaiveDate,
    /// Audit note; never empty
    pub notes: String,
}

/// Note recorded when the user leaves the note field blank
#[must_use]
pub fn default_note(reason: &str) -> String {
    format!("Quick adjustment: {reason}")
}

/// Build a movement payload from a validated draft
#[must_use]
pub fn compose_movement(movement: &ValidatedMovement) -> MovementPayload {
    let draft = movement.draft();
    let reason = draft.reason.to_string();
    let notes = draft
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| default_note(&reason), str::to_string);

    MovementPayload {
        asset_id: movement.asset().id.clone(),
        movement_type: movement.movement_type(),
        quantity: movement.signed_quantity(),
        unit_of_measure: movement.asset().unit_of_measure.clone(),
        reason,
        date: draft.date,
        notes,
    }
}
