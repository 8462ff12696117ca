//! End-to-end sift pass
//!
//! Load descriptors, health-check them, select the restrictive subset and
//! persist both lists. Batch-level shortfalls abort before anything is
//! written so the previous output stays in place.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::{Config, IoConfig, ThresholdConfig};
use crate::error::{Result, SiftError, Stage};
use crate::health::{HealthChecker, NetworkProber, VerdictCounts};
use crate::models::{CheckPolicy, Descriptor};
use crate::repository::DescriptorRepository;
use crate::selection::TieredSelector;

/// Lists produced by a successful pass
#[derive(Debug, Clone)]
pub struct SiftOutcome {
    /// Every alive descriptor, in health-check completion order
    pub alive: Vec<Descriptor>,
    /// Restrictive subset, or `None` when it fell below its minimum
    pub restrictive: Option<Vec<Descriptor>>,
    pub counts: VerdictCounts,
}

/// Health check followed by tiered selection
pub struct Pipeline {
    checker: HealthChecker,
    selector: TieredSelector,
    policy: CheckPolicy,
    thresholds: ThresholdConfig,
}

impl Pipeline {
    pub fn new(
        checker: HealthChecker,
        selector: TieredSelector,
        policy: CheckPolicy,
        thresholds: ThresholdConfig,
    ) -> Self {
        Self {
            checker,
            selector,
            policy,
            thresholds,
        }
    }

    /// Build a pipeline that probes the real network
    pub fn from_config(config: &Config) -> Self {
        let prober = Arc::new(NetworkProber::new(config.probe.clone()));
        Self::new(
            HealthChecker::new(prober, config.checker.clone()),
            TieredSelector::new(config.selection.clone()),
            config.check_policy,
            config.thresholds.clone(),
        )
    }

    /// Check and select; no I/O besides probing
    #[instrument(skip_all, fields(total = descriptors.len()))]
    pub async fn run(&self, descriptors: Vec<Descriptor>) -> Result<SiftOutcome> {
        if descriptors.is_empty() {
            return Err(SiftError::SourceUnavailable);
        }

        let report = self.checker.run(descriptors, self.policy).await;
        let counts = report.counts;
        let alive = report.into_alive();

        if alive.len() < self.thresholds.min_alive_count {
            return Err(SiftError::InsufficientResults {
                stage: Stage::Alive,
                found: alive.len(),
                required: self.thresholds.min_alive_count,
            });
        }

        let selection = self.selector.select(&alive);
        let restrictive = if selection.selected.len() < self.thresholds.min_restrictive_count {
            warn!(
                "{}",
                SiftError::InsufficientResults {
                    stage: Stage::Restrictive,
                    found: selection.selected.len(),
                    required: self.thresholds.min_restrictive_count,
                }
            );
            None
        } else {
            Some(selection.selected)
        };

        Ok(SiftOutcome {
            alive,
            restrictive,
            counts,
        })
    }

    /// Load from `io.input`, run, and write the outputs
    pub async fn execute(&self, io: &IoConfig) -> Result<SiftOutcome> {
        let descriptors = DescriptorRepository::new(&io.input).load().await?;
        let outcome = self.run(descriptors).await?;
        persist(&outcome, io).await?;
        Ok(outcome)
    }
}

/// Write the alive list, then the restrictive list if one was produced
pub async fn persist(outcome: &SiftOutcome, io: &IoConfig) -> Result<()> {
    DescriptorRepository::new(&io.alive_output)
        .save(&outcome.alive)
        .await?;

    match &outcome.restrictive {
        Some(restrictive) => {
            DescriptorRepository::new(&io.restrictive_output)
                .save(restrictive)
                .await?
        }
        None => info!(
            "Restrictive list not written; {} left untouched",
            io.restrictive_output.display()
        ),
    }

    Ok(())
}
