// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Stock ledger adjustment rules
//!
//! Everything here is pure. The stock figures come from a per-session
//! snapshot; the server owns the real balance.

use crate::error::ValidationError;
use crate::types::{AssetStockSnapshot, Direction, MovementReason, MovementType, StockMovementDraft};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Signed delta for a direction and an unsigned magnitude
#[must_use]
pub fn compute_delta(direction: Direction, magnitude: Decimal) -> Decimal {
    match direction {
        Direction::Add => magnitude,
        Direction::Subtract => -magnitude,
    }
}

/// Ledger category for a direction and reason.
///
/// Only three pairs map to a specific category; every other pair is an
/// adjustment.
#[must_use]
pub fn classify(direction: Direction, reason: &MovementReason) -> MovementType {
    match (direction, reason) {
        (Direction::Add, MovementReason::Purchase) => MovementType::Purchase,
        (Direction::Subtract, MovementReason::Usage) => MovementType::Usage,
        (Direction::Subtract, MovementReason::Damaged) => MovementType::Disposal,
        _ => MovementType::Adjustment,
    }
}

/// Stock after applying `signed_quantity`, or `None` on overflow
#[must_use]
pub fn resulting_stock(current_stock: Decimal, signed_quantity: Decimal) -> Option<Decimal> {
    current_stock.checked_add(signed_quantity)
}

/// Reject a delta that would take stock below zero.
///
/// Additions always pass; there is no stock ceiling. A sum that cannot be
/// represented is rejected rather than wrapped.
pub fn validate(current_stock: Decimal, signed_quantity: Decimal) -> Result<(), ValidationError> {
    let Some(resulting) = resulting_stock(current_stock, signed_quantity) else {
        return Err(ValidationError::QuantityOutOfRange {
            current: current_stock,
            requested: signed_quantity,
        });
    };
    if signed_quantity < Decimal::ZERO && resulting < Decimal::ZERO {
        return Err(ValidationError::InsufficientStock {
            current: current_stock,
            requested: signed_quantity,
            resulting,
        });
    }
    Ok(())
}

/// Format a quantity with exactly two decimals
#[must_use]
pub fn format_quantity(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

/// Before/after figures for an adjustment, valid or not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockPreview {
    /// Stock on hand
    pub current_stock: Decimal,
    /// Signed adjustment
    pub signed_quantity: Decimal,
    /// `current_stock + signed_quantity`; `None` when out of range
    pub resulting_stock: Option<Decimal>,
    /// Resulting stock falls under the asset's reorder threshold
    pub below_minimum: bool,
}

impl StockPreview {
    /// Resulting stock with two decimals
    #[must_use]
    pub fn resulting_display(&self) -> String {
        self.resulting_stock
            .map_or_else(|| "out of range".to_string(), format_quantity)
    }

    /// Whether the adjustment passes [`validate`]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        validate(self.current_stock, self.signed_quantity).is_ok()
    }
}

impl fmt::Display for StockPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.signed_quantity < Decimal::ZERO { "" } else { "+" };
        write!(
            f,
            "{} {}{} -> {}",
            format_quantity(self.current_stock),
            sign,
            format_quantity(self.signed_quantity),
            self.resulting_display()
        )
    }
}

/// Preview an adjustment. Always succeeds so a rejection can be explained.
#[must_use]
pub fn preview(current_stock: Decimal, signed_quantity: Decimal) -> StockPreview {
    StockPreview {
        current_stock,
        signed_quantity,
        resulting_stock: resulting_stock(current_stock, signed_quantity),
        below_minimum: false,
    }
}

/// Preview an adjustment against an asset, flagging the reorder threshold
#[must_use]
pub fn preview_for(asset: &AssetStockSnapshot, signed_quantity: Decimal) -> StockPreview {
    let mut p = preview(asset.current_stock, signed_quantity);
    p.below_minimum = match p.resulting_stock {
        Some(r) => r < asset.minimum_stock,
        None => signed_quantity < Decimal::ZERO,
    };
    p
}

/// A movement draft that passed every ledger gate.
///
/// Only [`validate_movement`] constructs one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMovement {
    asset: AssetStockSnapshot,
    draft: StockMovementDraft,
    signed_quantity: Decimal,
    movement_type: MovementType,
    preview: StockPreview,
}

impl ValidatedMovement {
    /// The asset snapshot the draft was checked against
    #[must_use]
    pub fn asset(&self) -> &AssetStockSnapshot {
        &self.asset
    }

    /// The validated draft
    #[must_use]
    pub fn draft(&self) -> &StockMovementDraft {
        &self.draft
    }

    /// Signed delta
    #[must_use]
    pub fn signed_quantity(&self) -> Decimal {
        self.signed_quantity
    }

    /// Ledger category
    #[must_use]
    pub fn movement_type(&self) -> MovementType {
        self.movement_type
    }

    /// Before/after figures
    #[must_use]
    pub fn preview(&self) -> &StockPreview {
        &self.preview
    }
}

/// Find the asset a draft refers to
pub fn resolve_asset<'a>(
    draft: &StockMovementDraft,
    assets: &'a [AssetStockSnapshot],
) -> Result<&'a AssetStockSnapshot, ValidationError> {
    let id = draft
        .asset_id
        .as_deref()
        .ok_or(ValidationError::MissingRequiredField("asset"))?;
    assets
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| ValidationError::UnresolvedAsset(id.to_string()))
}

/// Run every gate a movement must pass before it can be submitted
pub fn validate_movement(
    draft: &StockMovementDraft,
    assets: &[AssetStockSnapshot],
) -> Result<ValidatedMovement, ValidationError> {
    let asset = resolve_asset(draft, assets)?;
    if draft.magnitude < Decimal::ZERO {
        return Err(ValidationError::NegativeMagnitude(draft.magnitude));
    }
    let signed_quantity = draft.signed_quantity();
    if signed_quantity.is_zero() {
        return Err(ValidationError::ZeroQuantity);
    }
    validate(asset.current_stock, signed_quantity)?;

    let preview = preview_for(asset, signed_quantity);
    if preview.below_minimum {
        tracing::debug!(asset = %asset.id, resulting = %preview.resulting_display(), "movement leaves asset below minimum stock");
    }

    Ok(ValidatedMovement {
        asset: asset.clone(),
        draft: draft.clone(),
        signed_quantity,
        movement_type: draft.movement_type(),
        preview,
    })
}
