use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::Receiver;

use crate::{engine::Engine, render::context::ConfigurationContext};

/// Reason to look at the cluster again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// configuration may have changed, reconcile unless its hash says otherwise
    ConfigChanged,
    /// reconcile even if the configuration looks the same
    Resync,
    Shutdown,
}

/// Supplies the current configuration every time the loop runs.
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    async fn load(&self) -> anyhow::Result<ConfigurationContext>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub reconciled: u32,
    pub skipped: u32,
    pub failed: u32,
}

#[derive(Debug, Default)]
struct Batch {
    run: bool,
    forced: bool,
    shutdown: bool,
}

impl Batch {
    fn add(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::ConfigChanged => self.run = true,
            Trigger::Resync => {
                self.run = true;
                self.forced = true;
            }
            Trigger::Shutdown => self.shutdown = true,
        }
    }
}

/// Reconciles whenever a trigger arrives. Triggers queued while a run is in progress are
/// merged into a single run.
pub struct TriggerLoop {
    engine: Arc<Engine>,
    source: Arc<dyn ConfigurationSource>,
    receiver: Receiver<Trigger>,
    last_hash: Option<String>,
}

impl TriggerLoop {
    pub fn new(engine: Arc<Engine>, source: Arc<dyn ConfigurationSource>, receiver: Receiver<Trigger>) -> Self {
        Self {
            engine,
            source,
            receiver,
            last_hash: None,
        }
    }

    /// Runs until a `Shutdown` arrives or every sender is dropped.
    pub async fn run(mut self) -> LoopSummary {
        let mut summary = LoopSummary::default();

        while let Some(trigger) = self.receiver.recv().await {
            let batch = self.drain(trigger);

            if batch.run {
                self.process(batch.forced, &mut summary).await;
            }

            if batch.shutdown {
                info!("Shutting down the trigger loop...");
                break;
            }
        }

        summary
    }

    fn drain(&mut self, first: Trigger) -> Batch {
        let mut batch = Batch::default();
        batch.add(first);

        while !batch.shutdown {
            match self.receiver.try_recv() {
                Ok(trigger) => batch.add(trigger),
                Err(_) => break,
            }
        }

        batch
    }

    async fn process(&mut self, forced: bool, summary: &mut LoopSummary) {
        let context = match self.source.load().await {
            Ok(context) => context,
            Err(err) => {
                error!("Couldn't load the configuration! {err:#}");
                summary.failed += 1;
                return;
            }
        };

        let hash = match self.engine.config_hash(&context) {
            Ok(hash) => hash,
            Err(err) => {
                error!("{err}");
                summary.failed += 1;
                return;
            }
        };

        if !forced && self.last_hash.as_ref() == Some(&hash) {
            info!("Configuration unchanged since the last run, skipping...");
            summary.skipped += 1;
            return;
        }

        match self.engine.reconcile(&context).await {
            Ok(report) if report.success => {
                self.last_hash = Some(hash);
                summary.reconciled += 1;
            }
            Ok(report) => {
                warn!("Reconciliation incomplete: {}", report.summary());
                self.last_hash = None;
                summary.failed += 1;
            }
            Err(err) => {
                error!("{err}");
                summary.failed += 1;
            }
        }
    }
}
