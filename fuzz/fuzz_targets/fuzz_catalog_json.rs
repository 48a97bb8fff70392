// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
#![no_main]

use fieldcapture::catalog::{parse_assets, parse_blocks};
use fieldcapture::location::BlockIndex;
use fieldcapture::types::LocationSample;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(blocks) = parse_blocks(text) {
        let index = BlockIndex::new(blocks.into());
        let _ = index.resolve(Some(&LocationSample::new(0.5, 0.5)));
    }
    let _ = parse_assets(text);
});
