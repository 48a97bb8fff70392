// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Invariant tests for the capture pipeline
//!
//! These tests verify critical invariants:
//! 1. Block resolution - the bounding-box index always agrees with a plain scan
//! 2. Ledger arithmetic - the non-negative gate and two-decimal display
//! 3. Attachment batches - a rejected batch leaves the list untouched

use fieldcapture::attachments::AttachmentStager;
use fieldcapture::error::ValidationError;
use fieldcapture::ledger::{classify, format_quantity, preview, validate};
use fieldcapture::location::{resolve_context, ring_contains, BlockIndex};
use fieldcapture::types::{
    BoundaryPolygon, Direction, LocationSample, MovementReason, MovementType, PendingFile,
};
use proptest::prelude::*;
use proptest::test_runner::Config;
use rust_decimal::Decimal;
use std::sync::Arc;

// =============================================================================
// Test Helpers
// =============================================================================

fn rect(id: &str, lon: f64, lat: f64, w: f64, h: f64) -> BoundaryPolygon {
    BoundaryPolygon {
        id: id.into(),
        name: format!("Block {id}"),
        ring: vec![(lon, lat), (lon + w, lat), (lon + w, lat + h), (lon, lat + h)],
        variety: None,
    }
}

fn rect_strategy() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (-10.0..10.0_f64, -10.0..10.0_f64, 0.1..5.0_f64, 0.1..5.0_f64)
}

fn decimal_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000_000_000_i64..1_000_000_000_i64, 0_u32..6).prop_map(|(m, s)| Decimal::new(m, s))
}

// =============================================================================
// Block Resolution
// =============================================================================

#[test]
fn test_overlapping_blocks_first_listed_wins() {
    let a = rect("A", 0.0, 0.0, 10.0, 10.0);
    let b = rect("B", 5.0, 5.0, 10.0, 10.0);
    let inside_both = LocationSample::new(7.0, 7.0);

    let listed = vec![a.clone(), b.clone()];
    assert_eq!(resolve_context(Some(&inside_both), &listed).map(|p| p.id.as_str()), Some("A"));

    let reversed = vec![b, a];
    assert_eq!(resolve_context(Some(&inside_both), &reversed).map(|p| p.id.as_str()), Some("B"));

    let index = BlockIndex::new(Arc::from(listed));
    assert_eq!(index.resolve(Some(&inside_both)).map(|p| p.id.as_str()), Some("A"));
}

#[test]
fn test_point_outside_all_blocks_is_none() {
    let blocks = vec![rect("A", 0.0, 0.0, 1.0, 1.0)];
    let far = LocationSample::new(40.0, -120.0);
    assert!(resolve_context(Some(&far), &blocks).is_none());
    assert!(resolve_context(None, &blocks).is_none());
}

proptest! {
    #![proptest_config(Config::with_cases(256))]

    #[test]
    fn index_agrees_with_linear_scan(
        rects in prop::collection::vec(rect_strategy(), 0..12),
        lon in -20.0..20.0_f64,
        lat in -20.0..20.0_f64,
    ) {
        let polygons: Vec<BoundaryPolygon> = rects
            .iter()
            .enumerate()
            .map(|(i, (x, y, w, h))| rect(&format!("b{i}"), *x, *y, *w, *h))
            .collect();
        let sample = LocationSample::new(lat, lon);

        let linear = resolve_context(Some(&sample), &polygons).map(|p| p.id.clone());
        let index = BlockIndex::new(Arc::from(polygons));
        let indexed = index.resolve(Some(&sample)).map(|p| p.id.clone());
        prop_assert_eq!(linear, indexed);
    }

    #[test]
    fn rectangle_interior_is_contained(
        (x, y, w, h) in rect_strategy(),
        fx in 0.05..0.95_f64,
        fy in 0.05..0.95_f64,
    ) {
        let poly = rect("r", x, y, w, h);
        prop_assert!(ring_contains(&poly.ring, x + fx * w, y + fy * h));
        prop_assert!(!ring_contains(&poly.ring, x + w + 1.0, y + fy * h));
        prop_assert!(!ring_contains(&poly.ring, x + fx * w, y - 1.0));
    }

    #[test]
    fn closing_vertex_does_not_change_answer(
        (x, y, w, h) in rect_strategy(),
        lon in -20.0..20.0_f64,
        lat in -20.0..20.0_f64,
    ) {
        let open = rect("r", x, y, w, h).ring;
        let mut closed = open.clone();
        closed.push(open[0]);
        prop_assert_eq!(ring_contains(&open, lon, lat), ring_contains(&closed, lon, lat));
    }
}

// =============================================================================
// Ledger Arithmetic
// =============================================================================

proptest! {
    #![proptest_config(Config::with_cases(256))]

    #[test]
    fn validate_rejects_only_negative_results_of_subtraction(
        current in decimal_strategy(),
        signed in decimal_strategy(),
    ) {
        let expected_err = signed < Decimal::ZERO && current + signed < Decimal::ZERO;
        prop_assert_eq!(validate(current, signed).is_err(), expected_err);
        prop_assert_eq!(preview(current, signed).is_valid(), !expected_err);
    }

    #[test]
    fn additions_always_pass(current in decimal_strategy(), magnitude in 0_i64..1_000_000_000) {
        prop_assert!(validate(current, Decimal::from(magnitude)).is_ok());
    }

    #[test]
    fn formatted_quantities_have_two_decimals(value in decimal_strategy()) {
        let text = format_quantity(value);
        let (_, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));
        prop_assert_eq!(frac.len(), 2, "{}", text);
    }

    #[test]
    fn free_form_reasons_are_adjustments(reason in "[a-z ]{1,24}") {
        let reason = MovementReason::from(reason.as_str());
        if matches!(reason, MovementReason::Other(_)) {
            prop_assert_eq!(classify(Direction::Add, &reason), MovementType::Adjustment);
            prop_assert_eq!(classify(Direction::Subtract, &reason), MovementType::Adjustment);
        }
    }
}

#[test]
fn test_subtraction_to_exactly_zero_is_allowed() {
    assert!(validate(Decimal::new(250, 2), Decimal::new(-250, 2)).is_ok());
    assert_eq!(
        validate(Decimal::new(250, 2), Decimal::new(-251, 2)),
        Err(ValidationError::InsufficientStock {
            current: Decimal::new(250, 2),
            requested: Decimal::new(-251, 2),
            resulting: Decimal::new(-1, 2),
        })
    );
}

// =============================================================================
// Attachment Batches
// =============================================================================

proptest! {
    #![proptest_config(Config::with_cases(64))]

    #[test]
    fn batch_is_all_or_nothing(
        first in prop::collection::vec(0_usize..64, 0..4),
        second in prop::collection::vec(0_usize..64, 1..6),
    ) {
        let limit = 32_usize;
        let mut stager = AttachmentStager::new("prop").with_limit(limit as u64);
        let files = |sizes: &[usize]| -> Vec<PendingFile> {
            sizes
                .iter()
                .enumerate()
                .map(|(i, n)| PendingFile::new(format!("f{i}.bin"), "application/octet-stream", vec![0_u8; *n]))
                .collect()
        };

        let before = match stager.add(files(&first)) {
            Ok(_) => first.len(),
            Err(_) => 0,
        };
        prop_assert_eq!(stager.len(), before);

        let result = stager.add(files(&second));
        if second.iter().all(|n| *n <= limit) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(stager.len(), before + second.len());
        } else {
            let is_size_error = matches!(result, Err(ValidationError::SizeLimitExceeded { .. }));
            prop_assert!(is_size_error);
            prop_assert_eq!(stager.len(), before);
        }
    }
}
