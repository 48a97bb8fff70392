// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Block resolution from a device location
//!
//! Resolution scans the catalog in order and returns the first block whose
//! outer ring contains the point (odd-crossing test). Overlapping blocks
//! always resolve to the one listed first. A miss is `None`, never an error.

use crate::types::{BoundaryPolygon, LocationSample, Vertex};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Axis-aligned bounding box of a ring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Western edge
    pub min_lon: f64,
    /// Southern edge
    pub min_lat: f64,
    /// Eastern edge
    pub max_lon: f64,
    /// Northern edge
    pub max_lat: f64,
}

impl Bounds {
    /// Bounding box of a ring, `None` for an empty ring
    #[must_use]
    pub fn of_ring(ring: &[Vertex]) -> Option<Self> {
        let (&(lon, lat), rest) = ring.split_first()?;
        let mut b = Self { min_lon: lon, min_lat: lat, max_lon: lon, max_lat: lat };
        for &(lon, lat) in rest {
            b.min_lon = b.min_lon.min(lon);
            b.min_lat = b.min_lat.min(lat);
            b.max_lon = b.max_lon.max(lon);
            b.max_lat = b.max_lat.max(lat);
        }
        Some(b)
    }

    /// Whether the point lies within or on the box
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Odd-crossing point-in-polygon test against a closed ring.
///
/// A trailing vertex equal to the first is ignored so explicitly closed
/// rings are not double-counted. Rings with fewer than three vertices
/// contain nothing.
#[must_use]
pub fn ring_contains(ring: &[Vertex], lon: f64, lat: f64) -> bool {
    let ring = match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    };
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Return the first polygon in `polygons` that contains `point`.
///
/// `None` when there is no location sample or no polygon encloses it.
#[must_use]
pub fn resolve_context<'a>(
    point: Option<&LocationSample>,
    polygons: &'a [BoundaryPolygon],
) -> Option<&'a BoundaryPolygon> {
    let point = point?;
    let hit = polygons
        .iter()
        .find(|p| ring_contains(&p.ring, point.longitude, point.latitude));
    match hit {
        Some(p) => tracing::debug!(block = %p.id, "location resolved to block"),
        None => tracing::debug!(
            lat = point.latitude,
            lon = point.longitude,
            "no enclosing block; manual selection required"
        ),
    }
    hit
}

/// Polygon catalog with precomputed bounding boxes.
///
/// Boxes only skip polygons that cannot contain the point; the scan still
/// walks the original order, so tie-breaking matches [`resolve_context`].
#[derive(Debug, Clone)]
pub struct BlockIndex {
    polygons: Arc<[BoundaryPolygon]>,
    bounds: Vec<Option<Bounds>>,
}

impl BlockIndex {
    /// Index a catalog
    #[must_use]
    pub fn new(polygons: Arc<[BoundaryPolygon]>) -> Self {
        let bounds = polygons.iter().map(|p| Bounds::of_ring(&p.ring)).collect();
        Self { polygons, bounds }
    }

    /// The indexed polygons, in catalog order
    #[must_use]
    pub fn polygons(&self) -> &[BoundaryPolygon] {
        &self.polygons
    }

    /// Look up a polygon by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BoundaryPolygon> {
        self.polygons.iter().find(|p| p.id == id)
    }

    /// First polygon containing `point`
    #[must_use]
    pub fn resolve(&self, point: Option<&LocationSample>) -> Option<&BoundaryPolygon> {
        let point = point?;
        let (lon, lat) = (point.longitude, point.latitude);
        self.polygons
            .iter()
            .zip(&self.bounds)
            .find(|(p, b)| b.is_some_and(|b| b.contains(lon, lat)) && ring_contains(&p.ring, lon, lat))
            .map(|(p, _)| p)
    }
}

// =============================================================================
// One-shot location fetch
// =============================================================================

/// Platform location source.
///
/// Permission denial and sensor failure are both reported as `None`.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Take a single position sample
    async fn current_position(&self) -> Option<LocationSample>;
}

/// Provider with a fixed answer, for desktops and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation(pub Option<LocationSample>);

#[async_trait]
impl GeolocationProvider for FixedLocation {
    async fn current_position(&self) -> Option<LocationSample> {
        self.0
    }
}

/// An in-flight location request owned by a capture session.
///
/// No timeout applies. Dropping or cancelling the fetch aborts the
/// underlying task.
#[derive(Debug)]
pub struct LocationFetch {
    task: JoinHandle<()>,
    rx: oneshot::Receiver<Option<LocationSample>>,
}

impl LocationFetch {
    /// Start sampling the provider on the current runtime
    pub fn spawn(provider: Arc<dyn GeolocationProvider>) -> Self {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let sample = provider.current_position().await;
            let _ = tx.send(sample);
        });
        Self { task, rx }
    }

    /// Result if the provider has already answered.
    ///
    /// `Some(None)` means the provider answered with nothing.
    pub fn try_take(&mut self) -> Option<Option<LocationSample>> {
        match self.rx.try_recv() {
            Ok(sample) => Some(sample),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(None),
        }
    }

    /// Wait for the provider's answer
    pub async fn wait(mut self) -> Option<LocationSample> {
        (&mut self.rx).await.ok().flatten()
    }

    /// Abort the request
    pub fn cancel(self) {
        self.task.abort();
    }

    /// Whether the request has been answered or aborted
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LocationFetch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
