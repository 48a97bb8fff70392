// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod compose;
pub mod config;
pub mod movement;
pub mod resolve;

use anyhow::{bail, Result};
use fieldcapture::error::{CaptureError, ValidationError};

/// Turn a validation failure into a CLI error carrying the user-facing text
pub(crate) fn rejected(err: ValidationError) -> Result<()> {
    let err = CaptureError::from(err);
    tracing::debug!(error = %err, "rejected");
    bail!("{}", err.user_message())
}
