//! File analysis pipeline
//!
//! Drives decode -> construct -> analyze for "the current file" on a
//! single-threaded executor (a tokio `LocalSet`). Each file selection opens a
//! new generation. Every continuation remembers the generation it started in
//! and commits nothing once a newer one exists, so superseded work fades out
//! at its next chunk or phase boundary without an explicit cancel signal.
//!
//! The pipeline is the sole owner of the region-set handle. It releases the
//! previous handle before a new generation starts and lends out
//! [`RegionSetRef`]s that stop resolving once that happens.

use crate::analysis::{AnalysisContext, AnalysisOutcome, AnalysisResult, StepwiseAnalyzer};
use crate::config::PipelineConfig;
use crate::core::{
    DecodeError, PhaseError, PipelineError, RegionSetHandle, RegionSetRef, ResourceLedger,
    UploadedFile,
};
use crate::formats::RegionDecoder;
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tokio::task::JoinHandle;

/// Observable pipeline state
///
/// States from `Analyzing` onward carry a lent reference to the current
/// region set; it is valid until the slot is cleared or replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    Parsing {
        progress: f64,
    },
    ParseFailed {
        error: PipelineError,
    },
    Analyzing {
        region_set: RegionSetRef,
        progress: f64,
    },
    Ready {
        region_set: RegionSetRef,
        result: AnalysisResult,
        /// Phases that failed; their fields are absent from `result`
        phase_errors: Vec<PhaseError>,
    },
    AnalysisFailed {
        region_set: RegionSetRef,
        error: PipelineError,
    },
}

impl PipelineState {
    /// Lent region-set reference, if this state carries one
    pub fn region_set(&self) -> Option<&RegionSetRef> {
        match self {
            PipelineState::Analyzing { region_set, .. }
            | PipelineState::Ready { region_set, .. }
            | PipelineState::AnalysisFailed { region_set, .. } => Some(region_set),
            _ => None,
        }
    }

    /// Progress of the running stage
    pub fn progress(&self) -> Option<f64> {
        match self {
            PipelineState::Parsing { progress } | PipelineState::Analyzing { progress, .. } => {
                Some(*progress)
            }
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            PipelineState::ParseFailed { error } | PipelineState::AnalysisFailed { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }

    /// Whether no work is pending for the current generation
    pub fn is_settled(&self) -> bool {
        !matches!(self, PipelineState::Parsing { .. } | PipelineState::Analyzing { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Parsing { progress } => write!(f, "parsing ({:.0}%)", progress * 100.0),
            PipelineState::ParseFailed { error } => write!(f, "parse failed: {}", error),
            PipelineState::Analyzing { progress, .. } => {
                write!(f, "analyzing ({:.0}%)", progress * 100.0)
            }
            PipelineState::Ready { .. } => write!(f, "ready"),
            PipelineState::AnalysisFailed { error, .. } => write!(f, "{}", error),
        }
    }
}

/// Token returned by [`FileAnalysisPipeline::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Listener = Rc<dyn Fn(&PipelineState)>;

struct PipelineInner {
    config: PipelineConfig,
    ledger: Rc<ResourceLedger>,
    analyzer: StepwiseAnalyzer,
    generation: Cell<u64>,
    handle: RefCell<Option<RegionSetHandle>>,
    state: RefCell<PipelineState>,
    listeners: RefCell<Vec<(SubscriptionToken, Listener)>>,
    next_token: Cell<u64>,
}

impl PipelineInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation
    }

    /// Start a new generation, releasing the previous generation's handle
    fn begin_generation(&self) -> u64 {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let previous = self.handle.borrow_mut().take();
        if let Some(handle) = previous {
            debug!("generation {} releases region set {}", generation, handle.id());
            handle.release();
        }
        generation
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.borrow_mut() = state.clone();
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(&state);
        }
    }

    /// Publish `state` if `generation` is still current
    fn commit(&self, generation: u64, state: PipelineState) -> bool {
        if !self.is_current(generation) {
            debug!(
                "dropping stale commit from generation {} (current {})",
                generation,
                self.generation.get()
            );
            return false;
        }
        self.set_state(state);
        true
    }

    async fn run_generation(self: Rc<Self>, generation: u64, file: UploadedFile) {
        let decoder = RegionDecoder::new(&self.config);
        let decoded = decoder
            .decode(
                &file,
                |progress| {
                    self.commit(generation, PipelineState::Parsing { progress });
                },
                || self.is_current(generation),
            )
            .await;

        if !self.is_current(generation) {
            debug!("generation {} superseded while decoding '{}'", generation, file.name());
            return;
        }

        let sequence = match decoded {
            Ok(sequence) => sequence,
            Err(DecodeError::Cancelled) => return,
            Err(e) => {
                info!("decoding '{}' failed: {}", file.name(), e);
                self.commit(generation, PipelineState::ParseFailed { error: e.into() });
                return;
            }
        };

        let handle = match RegionSetHandle::construct(sequence, &self.ledger) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("constructing region set for '{}' failed: {}", file.name(), e);
                self.commit(generation, PipelineState::ParseFailed { error: e.into() });
                return;
            }
        };

        let region_set = handle.lend();
        let displaced = self.handle.borrow_mut().replace(handle);
        if let Some(displaced) = displaced {
            // begin_generation already took the previous handle
            warn!("region set {} was still installed; releasing", displaced.id());
            displaced.release();
        }
        self.commit(
            generation,
            PipelineState::Analyzing {
                region_set: region_set.clone(),
                progress: 0.0,
            },
        );

        self.run_analysis(generation, region_set).await;
    }

    async fn run_analysis(self: &Rc<Self>, generation: u64, region_set: RegionSetRef) {
        let outcome = self
            .analyzer
            .analyze(
                &region_set,
                |progress| {
                    self.commit(
                        generation,
                        PipelineState::Analyzing {
                            region_set: region_set.clone(),
                            progress,
                        },
                    );
                },
                || self.is_current(generation),
            )
            .await;

        match outcome {
            AnalysisOutcome::Completed(report) => {
                info!(
                    "generation {} ready: {} fields, {} phase errors",
                    generation,
                    report.result.populated_fields(),
                    report.phase_errors.len()
                );
                self.commit(
                    generation,
                    PipelineState::Ready {
                        region_set,
                        result: report.result,
                        phase_errors: report.phase_errors,
                    },
                );
            }
            AnalysisOutcome::AllPhasesFailed(errors) => {
                info!("generation {} analysis unavailable", generation);
                self.commit(
                    generation,
                    PipelineState::AnalysisFailed {
                        region_set,
                        error: PipelineError::AllPhasesFailed(errors),
                    },
                );
            }
            AnalysisOutcome::Cancelled => {
                debug!("generation {} superseded while analyzing", generation);
            }
        }
    }
}

/// Cancellation-safe decode/analyze state machine for one file slot
///
/// Must be driven from inside a tokio `LocalSet`: `select_file` and
/// `rerun_analysis` spawn their work with `spawn_local`.
pub struct FileAnalysisPipeline {
    inner: Rc<PipelineInner>,
}

impl FileAnalysisPipeline {
    /// Pipeline running the default phases over `context`
    ///
    /// `config.promoter_window` overrides the context's window.
    pub fn new(config: PipelineConfig, context: AnalysisContext) -> Self {
        let context = context.with_promoter_window(config.promoter_window);
        let analyzer = StepwiseAnalyzer::new(Rc::new(context));
        Self::with_analyzer(config, analyzer)
    }

    pub fn with_analyzer(config: PipelineConfig, analyzer: StepwiseAnalyzer) -> Self {
        let ledger = ResourceLedger::new(config.max_regions);
        Self {
            inner: Rc::new(PipelineInner {
                config,
                ledger,
                analyzer,
                generation: Cell::new(0),
                handle: RefCell::new(None),
                state: RefCell::new(PipelineState::Idle),
                listeners: RefCell::new(Vec::new()),
                next_token: Cell::new(0),
            }),
        }
    }

    /// Start processing `file`, superseding whatever was in flight
    ///
    /// The previous handle is released before this returns.
    pub fn select_file(&self, file: UploadedFile) -> JoinHandle<()> {
        let generation = self.inner.begin_generation();
        debug!("generation {} selected '{}' ({} bytes)", generation, file.name(), file.size());
        self.inner.set_state(PipelineState::Parsing { progress: 0.0 });

        let inner = Rc::clone(&self.inner);
        tokio::task::spawn_local(inner.run_generation(generation, file))
    }

    /// Re-run the analysis phases over the current region set
    ///
    /// Opens a new generation that keeps the existing handle. Returns `None`
    /// when no region set is installed.
    pub fn rerun_analysis(&self) -> Option<JoinHandle<()>> {
        let region_set = self.inner.handle.borrow().as_ref().map(|h| h.lend())?;
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        debug!("generation {} re-runs analysis of region set {}", generation, region_set.id());
        self.inner.set_state(PipelineState::Analyzing {
            region_set: region_set.clone(),
            progress: 0.0,
        });

        let inner = Rc::clone(&self.inner);
        Some(tokio::task::spawn_local(async move {
            inner.run_analysis(generation, region_set).await;
        }))
    }

    /// Release the current handle and return to `Idle`
    pub fn clear(&self) {
        let generation = self.inner.begin_generation();
        debug!("generation {} cleared the slot", generation);
        self.inner.set_state(PipelineState::Idle);
    }

    pub fn get_state(&self) -> PipelineState {
        self.inner.state.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    /// Lend the current generation's region set
    pub fn region_set(&self) -> Option<RegionSetRef> {
        self.inner.handle.borrow().as_ref().map(|h| h.lend())
    }

    /// Construction/release bookkeeping for this pipeline's handles
    pub fn ledger(&self) -> Rc<ResourceLedger> {
        Rc::clone(&self.inner.ledger)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Call `listener` with every state published from now on
    pub fn subscribe(&self, listener: impl Fn(&PipelineState) + 'static) -> SubscriptionToken {
        let token = SubscriptionToken(self.inner.next_token.get());
        self.inner.next_token.set(token.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((token, Rc::new(listener)));
        token
    }

    /// Remove a listener; returns false if the token was unknown
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(t, _)| *t != token);
        listeners.len() != before
    }
}

impl Drop for FileAnalysisPipeline {
    fn drop(&mut self) {
        // Outstanding tasks hold the inner state; make them stale and free the handle now
        self.inner.begin_generation();
    }
}
