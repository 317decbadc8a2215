use std::{sync::Arc, time::Duration};

use anyhow::Context;
use azure_cloud_provider_core::{
    engine::Engine,
    trigger::{Trigger, TriggerLoop},
};
use log::{debug, info};
use tokio::sync::mpsc::{channel, error::TrySendError};

use crate::{cli::RunArgs, config::ConfigFile};

const TRIGGER_QUEUE_SIZE: usize = 8;

pub async fn run(args: RunArgs, engine: Arc<Engine>, config: ConfigFile) -> anyhow::Result<()> {
    info!("Watching {:?} for configuration changes...", config.path());

    let (sender, receiver) = channel(TRIGGER_QUEUE_SIZE);
    let trigger_loop = TriggerLoop::new(engine, Arc::new(config), receiver);
    let trigger_task = tokio::spawn(trigger_loop.run());

    sender.send(Trigger::Resync).await?;

    let mut interval = tokio::time::interval(Duration::from_secs(args.interval.max(1)));
    interval.tick().await;
    let mut checks = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                checks += 1;
                let trigger = match args.resync_every {
                    0 => Trigger::ConfigChanged,
                    every if checks % u64::from(every) == 0 => Trigger::Resync,
                    _ => Trigger::ConfigChanged,
                };

                match sender.try_send(trigger) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => debug!("A run is already queued, skipping {trigger:?}"),
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Couldn't listen for the interrupt signal!")?;
                info!("Interrupted, finishing the current run...");
                // the loop may already be gone
                let _ = sender.send(Trigger::Shutdown).await;
                break;
            }
        }
    }

    let summary = trigger_task.await.context("The trigger loop crashed!")?;

    info!(
        "Finished after {} reconciliations ({} skipped, {} failed)",
        summary.reconciled, summary.skipped, summary.failed
    );

    Ok(())
}
