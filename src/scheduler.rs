//! Pass scheduling
//!
//! The computational core is a pure function; this module is the thin
//! async shell that decides when to run it. Data-model snapshots arrive on
//! an mpsc channel, get debounced so a typing burst costs one pass, and
//! the resulting [`PassOutput`] is published on a watch channel as one
//! atomic unit. A snapshot that is superseded before its pass publishes is
//! discarded, never merged; snapshot revisions only move forward.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::EngineConfig;
use crate::datamodel::DataModelSnapshot;
use crate::pass::{run_pass, PassInput, PassOutput};

const UPDATE_QUEUE_DEPTH: usize = 64;

/// Owns the background pass loop for one form instance.
pub struct Scheduler {
    updates: mpsc::Sender<DataModelSnapshot>,
    output: watch::Receiver<Arc<PassOutput>>,
    task: JoinHandle<()>,
}

impl Scheduler {
    /// Run an initial pass over the seed input and start the loop.
    /// Must be called from within a tokio runtime.
    pub fn spawn(input: PassInput, config: EngineConfig) -> Self {
        let initial = Arc::new(run_pass(&input, &config));
        let (update_tx, update_rx) = mpsc::channel(UPDATE_QUEUE_DEPTH);
        let (output_tx, output_rx) = watch::channel(Arc::clone(&initial));

        let task = tokio::spawn(pass_loop(input, config, update_rx, output_tx));

        Self {
            updates: update_tx,
            output: output_rx,
            task,
        }
    }

    /// Submit a new data-model snapshot. The pass runs after the debounce
    /// window closes; submitting faster than that coalesces.
    pub async fn submit(&self, snapshot: DataModelSnapshot) -> Result<()> {
        self.updates
            .send(snapshot)
            .await
            .context("scheduler loop has shut down")
    }

    /// Watch published outputs. The receiver always holds the most recent
    /// complete pass.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PassOutput>> {
        self.output.clone()
    }

    /// The most recently published output.
    pub fn latest(&self) -> Arc<PassOutput> {
        self.output.borrow().clone()
    }

    /// Stop accepting snapshots and wait for the loop to drain.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.updates);
        self.task.await.context("scheduler loop panicked")
    }
}

async fn pass_loop(
    mut input: PassInput,
    config: EngineConfig,
    mut updates: mpsc::Receiver<DataModelSnapshot>,
    output: watch::Sender<Arc<PassOutput>>,
) {
    let mut last_revision = input.data.revision();
    let mut carried: Option<DataModelSnapshot> = None;

    loop {
        let first = match carried.take() {
            Some(snapshot) => Some(snapshot),
            None => updates.recv().await,
        };
        let mut latest = match first {
            Some(snapshot) => snapshot,
            None => break,
        };

        // Debounce: absorb the burst, keep the newest revision.
        loop {
            match time::timeout(config.debounce(), updates.recv()).await {
                Ok(Some(next)) => {
                    if next.revision() > latest.revision() {
                        latest = next;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }

        if latest.revision() <= last_revision {
            tracing::debug!(
                target: "formtree::scheduler",
                revision = latest.revision(),
                last = last_revision,
                "discarding stale snapshot"
            );
            continue;
        }

        input.data = latest;
        let result = Arc::new(run_pass(&input, &config));

        // A snapshot that arrived while the pass ran supersedes it.
        if let Ok(next) = updates.try_recv() {
            if next.revision() > result.revision {
                tracing::debug!(
                    target: "formtree::scheduler",
                    revision = result.revision,
                    superseded_by = next.revision(),
                    "discarding stale pass"
                );
                carried = Some(next);
                continue;
            }
        }

        last_revision = result.revision;
        if output.send(result).is_err() {
            break;
        }
    }
}
