//! Fixed-inventory coverage client.
//!
//! Answers every query from a preconfigured list of areas. Used by tests
//! and by deployments whose trackable locations are known ahead of time.

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use super::{CoverageArea, CoverageClient, CoverageQuery, CoverageResult};

/// How the client handles incoming queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Deliver the configured areas immediately.
    #[default]
    Respond,
    /// Keep the query pending; the sender stays alive but never fires.
    Hold,
    /// Drop the sender without answering, failing the query.
    Drop,
}

#[derive(Default)]
struct ClientInner {
    areas: Vec<CoverageArea>,
    mode: ResponseMode,
    queries: Vec<CoverageQuery>,
    held: Vec<oneshot::Sender<CoverageResult>>,
}

/// A [`CoverageClient`] backed by a fixed list of areas.
#[derive(Default)]
pub struct StaticCoverageClient {
    inner: Mutex<ClientInner>,
}

impl StaticCoverageClient {
    /// Create a client answering with the given areas.
    pub fn new(areas: Vec<CoverageArea>) -> Self {
        Self {
            inner: Mutex::new(ClientInner {
                areas,
                ..ClientInner::default()
            }),
        }
    }

    /// Create a client that answers every query with no candidates.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Change how subsequent queries are handled.
    pub fn set_mode(&self, mode: ResponseMode) {
        self.inner.lock().mode = mode;
    }

    /// Number of queries received so far.
    pub fn query_count(&self) -> usize {
        self.inner.lock().queries.len()
    }

    /// The most recent query, if any.
    pub fn last_query(&self) -> Option<CoverageQuery> {
        self.inner.lock().queries.last().copied()
    }
}

impl CoverageClient for StaticCoverageClient {
    fn request_coverage(&self, query: CoverageQuery) -> oneshot::Receiver<CoverageResult> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        inner.queries.push(query);
        match inner.mode {
            ResponseMode::Respond => {
                let areas = inner.areas.clone();
                debug!(
                    candidates = areas.len(),
                    radius = query.radius_meters,
                    "static coverage client answering query"
                );
                let _ = tx.send(CoverageResult { query, areas });
            }
            ResponseMode::Hold => {
                debug!("static coverage client holding query open");
                inner.held.push(tx);
            }
            ResponseMode::Drop => {
                debug!("static coverage client dropping query");
                drop(tx);
            }
        }
        rx
    }
}
