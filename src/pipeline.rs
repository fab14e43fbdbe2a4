//! The pipeline orchestrator.
//!
//! Owns the run state, drives the nodes through the transition table in
//! [`crate::state`], emits stage entry/exit events, and enforces the
//! request-level deadline. This is the composition root: ports come in
//! through the builder, and a [`RunReport`] comes out of every run, never
//! an unhandled fault.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::BriefError;
use crate::events::{EventKind, StageEvent, StageObserver, TracingObserver};
use crate::nodes::{
    error_brief, mechanical_brief, ContextNode, Deadline, ErrorHandlerNode, PlannerNode,
    SearchFetchNode, SummarizeNode, SynthesizeNode,
};
use crate::ports::{ContentFetcher, HistoryStore, LanguageModel, SearchProvider};
use crate::schemas::{BriefRequest, FinalBrief};
use crate::state::{next_stage, FailureKind, FailureRecord, ResearchState, Stage};
use crate::structured::StructuredGenerator;

/// Outcome of one pipeline run: the brief plus run metadata for the caller
/// to persist or report. `brief.failure_reason` distinguishes error-shaped
/// briefs from (possibly degraded) successful ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub brief: FinalBrief,
    pub failures: Vec<FailureRecord>,
    #[serde(with = "humantime_serde")]
    pub execution_time: Duration,
    pub run_id: Uuid,
    /// Which terminal stage produced the brief (synthesize or error)
    pub completed_via: Stage,
}

/// The research brief pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    context: ContextNode,
    planner: PlannerNode,
    search: SearchFetchNode,
    summarize: SummarizeNode,
    synthesize: SynthesizeNode,
    error_handler: ErrorHandlerNode,
    observer: Arc<dyn StageObserver>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Run one research brief request end-to-end.
    pub async fn run(&self, request: BriefRequest) -> RunReport {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let deadline = Deadline::after(self.config.request_deadline);
        let mut seq: u64 = 0;
        let mut completed_via = Stage::Error;

        info!(
            %run_id,
            topic = %request.topic,
            depth = %request.depth,
            follow_up = request.follow_up,
            "starting research brief run"
        );

        let mut state = ResearchState::new(&request);
        if let Err(e) = request.validate() {
            state.record_failure(FailureKind::Planning, format!("invalid request: {e}"), false);
        }

        loop {
            let next = next_stage(&state);
            state.stage = next;
            if next == Stage::Done {
                break;
            }

            self.emit(&mut seq, run_id, next, EventKind::Entered);
            state = self.run_stage(next, state, deadline).await;
            if matches!(next, Stage::Synthesize | Stage::Error) {
                completed_via = next;
            }
            self.emit(&mut seq, run_id, next, EventKind::Exited);
        }

        let brief = state.final_brief.take().unwrap_or_else(|| error_brief(&state));
        let report = RunReport {
            brief,
            failures: state.failures,
            execution_time: started.elapsed(),
            run_id,
            completed_via,
        };

        info!(
            %run_id,
            completed_via = %report.completed_via,
            failures = report.failures.len(),
            elapsed_ms = report.execution_time.as_millis() as u64,
            "research brief run finished"
        );
        report
    }

    async fn run_stage(&self, stage: Stage, state: ResearchState, deadline: Deadline) -> ResearchState {
        if deadline.expired() && stage != Stage::Error {
            return self.handle_deadline(stage, state);
        }

        match stage {
            Stage::Context => self.context.run(state, deadline).await,
            Stage::Plan => self.planner.run(state, deadline).await,
            Stage::Search => self.search.run(state, deadline).await,
            Stage::Summarize => self.summarize.run(state, deadline).await,
            Stage::Synthesize => self.synthesize.run(state, deadline).await,
            Stage::Error => self.error_handler.run(state),
            // Init and Done never reach a node
            Stage::Init | Stage::Done => state,
        }
    }

    /// Deadline policy at a stage boundary: with usable summaries in hand the
    /// run still produces a brief (assembled mechanically); otherwise the
    /// expired deadline is fatal and routes to the error handler.
    fn handle_deadline(&self, stage: Stage, mut state: ResearchState) -> ResearchState {
        warn!(stage = %stage, "request deadline exceeded at stage boundary");

        if stage == Stage::Synthesize && !state.source_summaries.is_empty() {
            state.record_failure(
                FailureKind::Timeout,
                "request deadline exceeded; brief assembled mechanically",
                true,
            );
            state.final_brief = Some(mechanical_brief(&state));
        } else {
            state.record_failure(FailureKind::Timeout, "request deadline exceeded", false);
        }
        state
    }

    fn emit(&self, seq: &mut u64, run_id: Uuid, stage: Stage, kind: EventKind) {
        let event = StageEvent { seq: *seq, run_id, stage, kind, at: Utc::now() };
        *seq += 1;
        self.observer.on_event(&event);
    }
}

/// Builder wiring ports, config, and observer into a [`Pipeline`].
pub struct PipelineBuilder {
    model: Option<Arc<dyn LanguageModel>>,
    search: Option<Arc<dyn SearchProvider>>,
    fetcher: Option<Arc<dyn ContentFetcher>>,
    history: Option<Arc<dyn HistoryStore>>,
    config: PipelineConfig,
    observer: Arc<dyn StageObserver>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            search: None,
            fetcher: None,
            history: None,
            config: PipelineConfig::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> Result<Pipeline, BriefError> {
        let model =
            self.model.ok_or_else(|| BriefError::Config("language model port is required".into()))?;
        let search =
            self.search.ok_or_else(|| BriefError::Config("search provider port is required".into()))?;
        let fetcher =
            self.fetcher.ok_or_else(|| BriefError::Config("content fetcher port is required".into()))?;
        let history =
            self.history.ok_or_else(|| BriefError::Config("history store port is required".into()))?;

        let config = self.config;
        let generator = StructuredGenerator::new(
            Arc::clone(&model),
            config.retry_budget,
            config.generate_timeout,
        );

        Ok(Pipeline {
            context: ContextNode::new(generator.clone(), history, config.clone()),
            planner: PlannerNode::new(generator.clone(), config.clone()),
            search: SearchFetchNode::new(search, fetcher, config.clone()),
            summarize: SummarizeNode::new(generator.clone(), config.clone()),
            synthesize: SynthesizeNode::new(generator, config.clone()),
            error_handler: ErrorHandlerNode,
            observer: self.observer,
            config,
        })
    }
}
