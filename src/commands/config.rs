// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

use anyhow::{bail, Result};
use fieldcapture::config::Config;

/// Print the effective configuration, or one key of it
pub fn run(config: &Config, key: Option<&str>) -> Result<()> {
    match key {
        Some(k) => match config.get(k) {
            Some(v) => println!("{v}"),
            None => bail!("Unknown configuration key: {k}"),
        },
        None => print!("{}", config.to_toml()?),
    }
    Ok(())
}
