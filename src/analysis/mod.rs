//! Stepwise region-set analysis
//!
//! Runs a list of independent phases over a lent region-set reference, one
//! after another, yielding to the scheduler between phases. A failing phase
//! only costs its own result field; analysis is reported as failed only when
//! every phase fails.

mod context;
mod phases;
mod result;

pub use context::{AnalysisContext, AnnotationSet, GenomeAssembly, ReferenceSequences, TssIndex};
pub use phases::{
    default_phases, AnalysisPhase, AnnotationOverlapPhase, ChromosomeDistributionPhase,
    GcContentPhase, GenomeInferencePhase, RegionCountPhase, TssDistancePhase, WidthStatsPhase,
};
pub use result::{
    AnalysisResult, AnnotationOverlap, GenomeMatch, PhaseOutput, TssDistanceSummary, WidthStats,
};

use crate::core::{PhaseError, PhaseResult, RegionSet, RegionSetRef};
use log::{debug, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Run one phase, turning a panic into that phase's error
fn run_guarded(phase: &dyn AnalysisPhase, set: &RegionSet, context: &AnalysisContext) -> PhaseResult<PhaseOutput> {
    panic::catch_unwind(AssertUnwindSafe(|| phase.run(set, context))).unwrap_or_else(|payload| {
        Err(PhaseError::new(
            phase.name(),
            format!("panicked: {}", panic_message(payload.as_ref())),
        ))
    })
}

/// Result of a completed analysis with at least one successful phase
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub result: AnalysisResult,
    /// Failures of individual phases, in execution order
    pub phase_errors: Vec<PhaseError>,
}

/// How an analysis run ended
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Some or all phases succeeded
    Completed(AnalysisReport),
    /// Every phase failed
    AllPhasesFailed(Vec<PhaseError>),
    /// The caller stopped being current between phases
    Cancelled,
}

/// Runs analysis phases in sequence
pub struct StepwiseAnalyzer {
    phases: Vec<Box<dyn AnalysisPhase>>,
    context: Rc<AnalysisContext>,
}

impl StepwiseAnalyzer {
    /// Analyzer with the default phase list
    pub fn new(context: Rc<AnalysisContext>) -> Self {
        Self::with_phases(context, default_phases())
    }

    /// Analyzer with a caller-supplied phase list
    pub fn with_phases(context: Rc<AnalysisContext>, phases: Vec<Box<dyn AnalysisPhase>>) -> Self {
        Self { phases, context }
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn phase_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.phases.iter().map(|p| p.name())
    }

    fn run_phase(&self, phase: &dyn AnalysisPhase, set: &RegionSetRef) -> Result<PhaseOutput, PhaseError> {
        set.with(|s| run_guarded(phase, s, &self.context))
            .map_err(|e| PhaseError::new(phase.name(), e.to_string()))?
    }

    /// Analyze cooperatively
    ///
    /// Each phase contributes `1/N` of progress when it settles. `is_current`
    /// is checked before every phase; once it returns false the run stops
    /// with [`AnalysisOutcome::Cancelled`].
    pub async fn analyze<P, C>(&self, set: &RegionSetRef, mut on_progress: P, is_current: C) -> AnalysisOutcome
    where
        P: FnMut(f64),
        C: Fn() -> bool,
    {
        let total = self.phases.len();
        let mut result = AnalysisResult::default();
        let mut errors = Vec::new();

        for (i, phase) in self.phases.iter().enumerate() {
            if !is_current() {
                debug!("analysis of region set {} cancelled before '{}'", set.id(), phase.name());
                return AnalysisOutcome::Cancelled;
            }
            match self.run_phase(phase.as_ref(), set) {
                Ok(output) => result.apply(output),
                Err(e) => {
                    warn!("{}", e);
                    errors.push(e);
                }
            }
            on_progress((i + 1) as f64 / total as f64);
            tokio::task::yield_now().await;
        }

        if !is_current() {
            return AnalysisOutcome::Cancelled;
        }
        Self::settle(total, result, errors)
    }

    /// Analyze to completion without yielding
    pub fn analyze_blocking(&self, set: &RegionSet) -> AnalysisOutcome {
        let mut result = AnalysisResult::default();
        let mut errors = Vec::new();

        for phase in &self.phases {
            match run_guarded(phase.as_ref(), set, &self.context) {
                Ok(output) => result.apply(output),
                Err(e) => {
                    warn!("{}", e);
                    errors.push(e);
                }
            }
        }
        Self::settle(self.phases.len(), result, errors)
    }

    fn settle(total: usize, result: AnalysisResult, errors: Vec<PhaseError>) -> AnalysisOutcome {
        if total > 0 && errors.len() == total {
            AnalysisOutcome::AllPhasesFailed(errors)
        } else {
            AnalysisOutcome::Completed(AnalysisReport {
                result,
                phase_errors: errors,
            })
        }
    }
}
