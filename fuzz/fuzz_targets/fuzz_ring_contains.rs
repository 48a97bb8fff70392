// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
#![no_main]

use arbitrary::Arbitrary;
use fieldcapture::location::{resolve_context, ring_contains, BlockIndex};
use fieldcapture::types::{BoundaryPolygon, LocationSample};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    rings: Vec<Vec<(f64, f64)>>,
    lat: f64,
    lon: f64,
}

fuzz_target!(|input: Input| {
    let polygons: Vec<BoundaryPolygon> = input
        .rings
        .into_iter()
        .enumerate()
        .map(|(i, ring)| BoundaryPolygon { id: i.to_string(), name: String::new(), ring, variety: None })
        .collect();
    let sample = LocationSample::new(input.lat, input.lon);

    if let Some(hit) = resolve_context(Some(&sample), &polygons) {
        assert!(ring_contains(&hit.ring, input.lon, input.lat));
    }
    let index = BlockIndex::new(polygons.into());
    if let Some(hit) = index.resolve(Some(&sample)) {
        assert!(ring_contains(&hit.ring, input.lon, input.lat));
    }
});
