//! Coverage queries and candidate selection.
//!
//! A coverage query asks an external service which trackable locations
//! exist near a geographic point. The service is reached through the
//! [`CoverageClient`] seam; results come back asynchronously over a oneshot
//! channel, exactly once per query.
//!
//! Ranking and selection live here as plain functions: candidates are
//! ordered by ascending great-circle distance from the query point, areas
//! without a default anchor payload are skipped (they cannot be tracked),
//! and selection stops at the caller's cap.

mod static_client;

pub use static_client::{ResponseMode, StaticCoverageClient};

use tokio::sync::oneshot;

use crate::anchor::AnchorPayload;
use crate::coord::GeoPoint;

/// A request for trackable locations around a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageQuery {
    /// Center of the search.
    pub point: GeoPoint,
    /// Search radius in meters.
    pub radius_meters: f64,
}

/// One coverage candidate: an area known to the localization service.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageArea {
    /// Human-readable name of the area.
    pub name: String,
    /// Geographic center of the area.
    pub centroid: GeoPoint,
    /// Payload for the area's default anchor, if it has one.
    ///
    /// An area without a payload cannot be tracked and is skipped during
    /// selection.
    pub default_payload: Option<AnchorPayload>,
}

impl CoverageArea {
    /// Create an area with a default anchor payload.
    pub fn new(
        name: impl Into<String>,
        centroid: GeoPoint,
        payload: impl Into<AnchorPayload>,
    ) -> Self {
        Self {
            name: name.into(),
            centroid,
            default_payload: Some(payload.into()),
        }
    }

    /// Create an area that carries no default anchor payload.
    pub fn without_payload(name: impl Into<String>, centroid: GeoPoint) -> Self {
        Self {
            name: name.into(),
            centroid,
            default_payload: None,
        }
    }

    /// Whether the area can be tracked at all.
    pub fn is_trackable(&self) -> bool {
        self.default_payload
            .as_ref()
            .is_some_and(|p| !p.is_empty())
    }
}

/// The answer to a coverage query.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageResult {
    /// The query this result answers.
    pub query: CoverageQuery,
    /// Candidate areas, in no particular order.
    pub areas: Vec<CoverageArea>,
}

/// External coverage service seam.
///
/// `request_coverage` must deliver at most one result per call. Dropping
/// the sending side without a result signals that the query failed.
pub trait CoverageClient: Send + Sync {
    /// Issue a coverage query. The result arrives on the returned receiver.
    fn request_coverage(&self, query: CoverageQuery) -> oneshot::Receiver<CoverageResult>;
}

/// Order candidates by ascending distance from `point` to their centroid.
///
/// Plain comparator sort; stability is not required.
pub fn rank_by_distance(point: GeoPoint, mut areas: Vec<CoverageArea>) -> Vec<CoverageArea> {
    areas.sort_by(|a, b| {
        point
            .distance_meters(&a.centroid)
            .total_cmp(&point.distance_meters(&b.centroid))
    });
    areas
}

/// Keep the first `max` trackable candidates, preserving order.
///
/// Candidates without a usable default anchor payload are skipped.
pub fn select_trackable(areas: Vec<CoverageArea>, max: usize) -> Vec<CoverageArea> {
    areas
        .into_iter()
        .filter(CoverageArea::is_trackable)
        .take(max)
        .collect()
}
