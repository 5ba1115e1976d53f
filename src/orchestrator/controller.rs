//! Run lifecycle controller.
//!
//! Owns the one-run-at-a-time rule and drives the engine for presentation
//! layers. A session accepts a new run only when no run is in flight; the
//! busy flag clears on every exit path, including failures.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::{PipelineEngine, StageServices};
use crate::inputs;
use crate::model::{PipelineEvent, RunConfig, RunInput, RunReport};

#[derive(Clone)]
pub(crate) struct SessionController {
    services: Arc<dyn StageServices>,
    processing: Arc<AtomicBool>,
}

impl SessionController {
    pub(crate) fn new(services: Arc<dyn StageServices>) -> Self {
        Self {
            services,
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Check the inputs, mark the session busy, and drive one run to
    /// completion. Input rejection happens before the busy flag is taken, so
    /// a refused run leaves no trace beyond its error.
    pub(crate) async fn start_run(
        &self,
        cfg: RunConfig,
        input: RunInput,
        event_tx: UnboundedSender<PipelineEvent>,
    ) -> Result<RunReport> {
        inputs::validate_inputs(&input)?;

        let _guard = ProcessingGuard::acquire(&self.processing)?;
        let engine = PipelineEngine::new(cfg, self.services.clone());
        let handle = tokio::spawn(async move { engine.run(input, event_tx).await });
        match handle.await {
            Ok(run_result) => run_result,
            // The engine task panicked or was aborted; the guard still drops.
            Err(join_err) => bail!("run task failed: {join_err}"),
        }
    }
}

struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            bail!("a tailoring run is already in progress");
        }
        Ok(Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
