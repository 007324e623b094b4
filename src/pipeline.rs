//! Runs the balancing phases in order and decides, after each one, whether
//! the run can go on.

use serde::Serialize;
use std::fmt;
use tracing::{info, info_span, warn};

use crate::config::AppConfig;
use crate::core::analysis::InventorySnapshot;
use crate::core::context::BalanceContext;
use crate::core::dataset::{DatasetLayout, Pool};
use crate::core::rebalance::{
    balance_categories, merge_incoming, CrossCategoryBalance, IntakeResult, MoveFailure,
};
use crate::core::rename::{rename_unique, RenameReport};
use crate::errors::BalanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    Balance,
    Rename,
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Intake => "intake",
            Phase::Balance => "balance",
            Phase::Rename => "rename",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the supervisor does with moves that still fail once their batch
/// has retried them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunPolicy {
    pub abort_on_failure: bool,
}

impl From<&AppConfig> for RunPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            abort_on_failure: config.abort_on_failure,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub moved: usize,
    /// Moves still failing after their batch retried them
    pub failures: Vec<MoveFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub phases: Vec<PhaseReport>,
    pub intake: Vec<IntakeResult>,
    pub balance: CrossCategoryBalance,
    pub summary: InventorySnapshot,
}

impl RunReport {
    pub fn unresolved_failures(&self) -> impl Iterator<Item = &MoveFailure> {
        self.phases.iter().flat_map(|p| p.failures.iter())
    }
}

pub struct Supervisor {
    policy: RunPolicy,
}

impl Supervisor {
    pub fn new(policy: RunPolicy) -> Self {
        Self { policy }
    }

    /// Intake (when an incoming pool is configured), then cross-category and
    /// per-category balancing, then a fresh inventory.
    pub fn run(&self, ctx: &mut BalanceContext) -> Result<RunReport, BalanceError> {
        let mut phases = Vec::new();

        let intake = if ctx.layout.has_incoming() {
            let _span = info_span!("intake").entered();
            info!("Moving all images from the incoming pool into train");
            let intake = merge_incoming(ctx)?;
            let moved = intake.iter().map(|r| r.relocation.moved_count()).sum();
            let failures = intake
                .iter()
                .flat_map(|r| r.relocation.failures.iter().cloned())
                .collect();
            phases.push(self.decide(PhaseReport {
                phase: Phase::Intake,
                moved,
                failures,
            })?);
            intake
        } else {
            Vec::new()
        };

        let balance = {
            let _span = info_span!("balance").entered();
            info!("Balancing categories");
            let balance = balance_categories(ctx)?;
            phases.push(self.decide(PhaseReport {
                phase: Phase::Balance,
                moved: balance.moved_count(),
                failures: balance.failures(),
            })?);
            balance
        };

        Ok(RunReport {
            phases,
            intake,
            balance,
            summary: InventorySnapshot::take(&ctx.layout),
        })
    }

    /// Give every train and val directory unique screenshot names
    pub fn rename(&self, layout: &DatasetLayout) -> Result<(PhaseReport, RenameReport), BalanceError> {
        let _span = info_span!("rename").entered();
        let mut total = RenameReport::default();

        for category in layout.categories() {
            for pool in [Pool::Train, Pool::Val] {
                if let Some(dir) = layout.category_dir(pool, category) {
                    info!("Renaming images in {}/{}", pool, category);
                    total.absorb(rename_unique(&dir)?);
                }
            }
        }

        // a failed rename is not retried: the file keeps its old, still valid name
        let report = self.decide(PhaseReport {
            phase: Phase::Rename,
            moved: total.renamed,
            failures: total.failures.clone(),
        })?;
        Ok((report, total))
    }

    /// Report a finished phase and decide whether the run goes on. Failures
    /// were already retried by their batch and are never moved again here.
    fn decide(&self, report: PhaseReport) -> Result<PhaseReport, BalanceError> {
        if report.failures.is_empty() {
            info!("{} phase moved {} file(s)", report.phase, report.moved);
            return Ok(report);
        }

        for failure in &report.failures {
            warn!("Unresolved: {:?} ({})", failure.source, failure.reason);
        }
        if self.policy.abort_on_failure {
            return Err(BalanceError::PhaseAborted {
                phase: report.phase,
                failures: report.failures.len(),
            });
        }

        warn!(
            "{} phase finished with {} unresolved failure(s), continuing",
            report.phase,
            report.failures.len()
        );
        Ok(report)
    }
}
