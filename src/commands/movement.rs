// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Stock movement preview and payload

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use fieldcapture::catalog;
use fieldcapture::compose::compose_movement;
use fieldcapture::ledger::format_quantity;
use fieldcapture::session::StockAdjustment;
use fieldcapture::types::Direction;
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Arguments for the movement command
pub struct MovementArgs {
    /// Asset catalog file
    pub assets: PathBuf,
    /// Asset id
    pub asset: String,
    /// add or subtract
    pub direction: String,
    /// Unsigned quantity as typed
    pub magnitude: String,
    /// Reason
    pub reason: String,
    /// Audit note
    pub note: Option<String>,
    /// Movement date
    pub date: Option<String>,
    /// Emit JSON
    pub json: bool,
}

/// Validate a movement against the asset snapshot and print the payload
pub fn run(args: MovementArgs) -> Result<()> {
    let assets = catalog::load_assets(&args.assets)?;
    let date = match args.date.as_deref() {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("Invalid date: {d}"))?,
        None => Local::now().date_naive(),
    };
    let direction: Direction = args.direction.parse().map_err(|e: String| anyhow!(e))?;
    let magnitude: Decimal = args
        .magnitude
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity: {}", args.magnitude))?;

    let mut adjustment = StockAdjustment::open(assets.into(), date);
    let draft = adjustment.draft_mut();
    draft.asset_id = Some(args.asset);
    draft.direction = direction;
    draft.magnitude = magnitude;
    draft.reason = args.reason.as_str().into();
    draft.note = args.note;

    if let (Some(asset), Some(preview)) = (adjustment.asset(), adjustment.preview()) {
        if !args.json {
            println!("Asset:    {} ({})", asset.name, asset.id);
            println!("Stock:    {} {}", preview, asset.unit_of_measure);
            if preview.below_minimum && preview.is_valid() {
                println!(
                    "Warning:  below minimum stock of {} {}",
                    format_quantity(asset.minimum_stock),
                    asset.unit_of_measure
                );
            }
        }
    }

    let validated = match adjustment.validate() {
        Ok(v) => v,
        Err(e) => return super::rejected(e),
    };
    let payload = compose_movement(&validated);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Type:     {:?}", payload.movement_type);
        println!("Quantity: {} {}", format_quantity(payload.quantity), payload.unit_of_measure);
        println!("Note:     {}", payload.notes);
    }
    Ok(())
}
