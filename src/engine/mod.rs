mod mock;
mod services;

pub use mock::MockStages;
pub use services::{StageError, StageServices};

#[cfg(test)]
pub(crate) use mock::{sample_posting, sample_profile};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::model::{
    rfc3339_now, InfoEvent, PipelineEvent, RunConfig, RunInput, RunReport, RunState, StageKind,
    StepDescriptor, StepStatus,
};

/// Drives the five stages in order, one at a time. Every stage waits out its
/// simulated work delay, runs, then waits out the settle delay so observers
/// see each step land before the next begins. The first failure aborts the
/// run; there are no retries and no skipping ahead.
pub struct PipelineEngine {
    cfg: RunConfig,
    services: Arc<dyn StageServices>,
}

impl PipelineEngine {
    pub fn new(cfg: RunConfig, services: Arc<dyn StageServices>) -> Self {
        Self { cfg, services }
    }

    pub async fn run(
        self,
        input: RunInput,
        event_tx: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Result<RunReport> {
        let started_at = rfc3339_now();
        let mut state = RunState::new(self.cfg.clone(), input);
        let mut steps: Vec<StepDescriptor> =
            StageKind::ALL.iter().map(|s| StepDescriptor::pending(*s)).collect();

        for stage in StageKind::ALL {
            let idx = stage.index();
            steps[idx].status = StepStatus::Active;
            let _ = event_tx.send(PipelineEvent::StepStarted { step: stage });

            tokio::time::sleep(self.cfg.pacing.work_delay(stage)).await;

            if let Err(err) = self.apply_stage(stage, &mut state, &event_tx).await {
                steps[idx].status = StepStatus::Failed;
                let _ = event_tx.send(PipelineEvent::StepFailed {
                    step: stage,
                    message: err.to_string(),
                });
                return Err(anyhow::Error::new(err)
                    .context(format!("step '{}' failed", stage.label())));
            }

            tokio::time::sleep(self.cfg.pacing.settle).await;
            steps[idx].status = StepStatus::Completed;
            let _ = event_tx.send(PipelineEvent::StepCompleted { step: stage });
        }

        let report = RunReport {
            run_id: self.cfg.run_id.clone(),
            started_at,
            finished_at: rfc3339_now(),
            cv_file_name: state
                .input
                .cv
                .as_ref()
                .map(|cv| cv.file_name.clone())
                .unwrap_or_default(),
            resume: state.resume.take().context("extract stage left no profile")?,
            job: state.job.take().context("analyze stage left no posting")?,
            tailored: state.tailored.take().context("tailor stage left no result")?,
            artifact: state.artifact.take().context("generate stage left no artifact")?,
            steps,
        };

        let _ = event_tx.send(PipelineEvent::RunCompleted {
            report: Box::new(report.clone()),
        });

        Ok(report)
    }

    /// Run one stage against the accumulated state and store its output.
    async fn apply_stage(
        &self,
        stage: StageKind,
        state: &mut RunState,
        event_tx: &mpsc::UnboundedSender<PipelineEvent>,
    ) -> Result<(), StageError> {
        match stage {
            StageKind::Validate => self.services.validate(state).await,
            StageKind::Extract => {
                let profile = self.services.extract_resume(state).await?;
                let _ = event_tx.send(PipelineEvent::Info(InfoEvent::ProfileExtracted {
                    name: profile.personal_details.name.clone(),
                }));
                state.resume = Some(profile);
                Ok(())
            }
            StageKind::Analyze => {
                let posting = self.services.analyze_job(state).await?;
                let _ = event_tx.send(PipelineEvent::Info(InfoEvent::JobAnalyzed {
                    title: posting.title.clone(),
                    company: posting.company.clone(),
                }));
                state.job = Some(posting);
                Ok(())
            }
            StageKind::Tailor => {
                let tailored = self.services.tailor(state).await?;
                state.tailored = Some(tailored);
                Ok(())
            }
            StageKind::Generate => {
                let artifact = self.services.generate_output(state).await?;
                state.artifact = Some(artifact);
                Ok(())
            }
        }
    }
}
