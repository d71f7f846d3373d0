//! Per-endpoint concurrency limiting.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

/// The kind of downstream endpoint a call is bound for, each with its
/// own concurrency budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// Embedding generation.
    Embedding,
    /// Rerank scoring.
    Rerank,
    /// Chat/completion calls.
    Llm,
    /// Code analysis/summarization calls.
    Analysis,
}

struct Lane {
    semaphore: Semaphore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Lane {
    fn new(permits: usize) -> Self {
        Self {
            semaphore: Semaphore::new(permits),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

/// Bounds concurrent in-flight calls per [`EndpointKind`] and tracks the
/// high-water mark for each, for observability.
pub struct EndpointLimiter {
    embedding: Lane,
    rerank: Lane,
    llm: Lane,
    analysis: Lane,
}

impl EndpointLimiter {
    /// Build a limiter with the given per-endpoint permit counts.
    pub fn new(embedding: usize, rerank: usize, llm: usize, analysis: usize) -> Self {
        Self {
            embedding: Lane::new(embedding),
            rerank: Lane::new(rerank),
            llm: Lane::new(llm),
            analysis: Lane::new(analysis),
        }
    }

    fn lane(&self, kind: EndpointKind) -> &Lane {
        match kind {
            EndpointKind::Embedding => &self.embedding,
            EndpointKind::Rerank => &self.rerank,
            EndpointKind::Llm => &self.llm,
            EndpointKind::Analysis => &self.analysis,
        }
    }

    /// Run `f` holding one permit for `kind`, updating the peak
    /// concurrency counter while it runs.
    pub async fn execute<F, T>(&self, kind: EndpointKind, f: F) -> T
    where
        F: Future<Output = T>,
    {
        let lane = self.lane(kind);
        let _permit = lane.semaphore.acquire().await.expect("semaphore never closed");
        let current = lane.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        lane.peak.fetch_max(current, Ordering::SeqCst);
        let result = f.await;
        lane.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Peak observed concurrency for `kind` since construction.
    pub fn peak(&self, kind: EndpointKind) -> usize {
        self.lane(kind).peak.load(Ordering::SeqCst)
    }

    /// Currently in-flight calls for `kind`.
    pub fn in_flight(&self, kind: EndpointKind) -> usize {
        self.lane(kind).in_flight.load(Ordering::SeqCst)
    }
}

impl Default for EndpointLimiter {
    fn default() -> Self {
        Self::new(4, 4, 4, 2)
    }
}

/// Shared handle, cheap to clone across client instances.
pub type SharedLimiter = Arc<EndpointLimiter>;
