//! Outer denormalization job
//!
//! Drives the engine over many trees (one per operation or sale). Trees
//! share no mutable state, so a page of trees is processed in parallel,
//! one tree fully processed per worker task. The unit of failure and
//! retry is one tree: data errors are logged and counted, the job never
//! aborts wholesale.

use crate::engine::DenormalizationEngine;
use crate::options::DenormalizationOptions;

use fdp_common::{BatchNode, DenormalizedBatch, Result};

use std::sync::Arc;

/// Reference to one denormalizable tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeRef {
    Operation(i64),
    Sale(i64),
}

impl std::fmt::Display for TreeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeRef::Operation(id) => write!(f, "operation #{}", id),
            TreeRef::Sale(id) => write!(f, "sale #{}", id),
        }
    }
}

/// Loads one catch batch tree (children and measurements pre-loaded).
/// Implemented by the persistence layer.
pub trait TreeSource: Send + Sync {
    fn load_batch_tree(&self, tree: &TreeRef) -> Result<BatchNode>;
}

/// Persists one flat result (full replace per operation or sale).
/// Implemented by the persistence layer; called after a tree's
/// computation completes.
pub trait ResultStore: Send + Sync {
    fn save_all(&self, tree: &TreeRef, batches: Vec<DenormalizedBatch>) -> Result<()>;
}

/// Aggregate outcome of one job run
#[derive(Debug, Default, Clone)]
pub struct JobReport {
    /// Trees denormalized and saved
    pub processed: usize,
    /// Trees skipped on a data error
    pub invalid: usize,
    /// One message per invalid tree
    pub messages: Vec<String>,
}

impl JobReport {
    pub fn merge(&mut self, other: JobReport) {
        self.processed += other.processed;
        self.invalid += other.invalid;
        self.messages.extend(other.messages);
    }

    /// One-line summary for job logs
    pub fn summary(&self) -> String {
        format!(
            "{} tree(s) processed, {} invalid",
            self.processed, self.invalid
        )
    }
}

/// The outer job: pages of trees, processed in parallel
pub struct DenormalizationJob {
    engine: DenormalizationEngine,
    source: Arc<dyn TreeSource>,
    store: Arc<dyn ResultStore>,
    workers: usize,
}

impl DenormalizationJob {
    pub fn new(
        engine: DenormalizationEngine,
        source: Arc<dyn TreeSource>,
        store: Arc<dyn ResultStore>,
        workers: usize,
    ) -> Self {
        Self {
            engine,
            source,
            store,
            workers: workers.max(1),
        }
    }

    /// Process every referenced tree, at most `workers` at a time.
    ///
    /// A single tree's computation is synchronous and not cancellable
    /// mid-flight; cancellation granularity is one tree.
    pub async fn run(
        &self,
        options: Arc<DenormalizationOptions>,
        trees: Vec<TreeRef>,
    ) -> JobReport {
        let mut report = JobReport::default();

        for page in trees.chunks(self.workers) {
            let mut handles = Vec::with_capacity(page.len());
            for &tree in page {
                let engine = self.engine.clone();
                let source = Arc::clone(&self.source);
                let store = Arc::clone(&self.store);
                let options = Arc::clone(&options);
                handles.push(tokio::task::spawn_blocking(move || {
                    process_one(&engine, source.as_ref(), store.as_ref(), &options, tree)
                }));
            }
            for handle in handles {
                match handle.await {
                    Ok(outcome) => report.merge(outcome),
                    Err(e) => {
                        tracing::error!("Denormalization worker panicked: {}", e);
                        report.invalid += 1;
                        report.messages.push(format!("worker failure: {}", e));
                    }
                }
            }
        }

        tracing::info!("Denormalization job finished: {}", report.summary());
        report
    }
}

fn process_one(
    engine: &DenormalizationEngine,
    source: &dyn TreeSource,
    store: &dyn ResultStore,
    options: &DenormalizationOptions,
    tree: TreeRef,
) -> JobReport {
    let mut report = JobReport::default();
    let outcome = source
        .load_batch_tree(&tree)
        .and_then(|root| engine.denormalize(&root, options))
        .and_then(|flat| store.save_all(&tree, flat));

    match outcome {
        Ok(()) => report.processed += 1,
        Err(e) if e.is_data_error() => {
            // bad data in one tree; not transient, not retried
            tracing::warn!("Skipping {}: {}", tree, e);
            report.invalid += 1;
            report.messages.push(format!("{}: {}", tree, e));
        }
        Err(e) => {
            tracing::error!("Failed to denormalize {}: {}", tree, e);
            report.invalid += 1;
            report.messages.push(format!("{}: {}", tree, e));
        }
    }
    report
}
