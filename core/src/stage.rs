//! Stage trait and the artifacts passed between stages.
//!
//! RULE: Every stage implements PipelineStage.
//! The pipeline calls run() on each registered stage once,
//! in registration order. Execution order is fixed and documented
//! in pipeline.rs.
//!
//! A stage reads only what earlier stages left in RunArtifacts. A missing
//! artifact is a MissingPrecursor error, never a silent default.

use crate::{
    attribution::{EventIndex, OfferAttribution},
    binning::BinningPlan,
    config::PipelineConfig,
    dataset::FeatureTable,
    error::PipelineResult,
    input::RawTables,
    model::ModelReport,
    preprocess::NormalizedTables,
    rng::StageRng,
    store::PipelineStore,
    summary::RunSummary,
    view_detection::AttributedOffer,
};
use serde::Serialize;

/// Read-only run context handed to every stage.
pub struct StageContext<'a> {
    pub run_id: &'a str,
    pub config: &'a PipelineConfig,
    pub store:  &'a PipelineStore,
}

/// Row counts recorded in the stage log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub rows_out:     usize,
    pub rows_dropped: usize,
}

/// Everything the stages produce, filled in as the run advances.
#[derive(Debug, Default)]
pub struct RunArtifacts {
    pub raw:          Option<RawTables>,
    pub tables:       Option<NormalizedTables>,
    pub event_index:  Option<EventIndex>,
    /// Consumed by view detection.
    pub attributions: Option<Vec<OfferAttribution>>,
    pub attributed:   Option<Vec<AttributedOffer>>,
    pub binning:      Option<BinningPlan>,
    pub dataset:      Option<FeatureTable>,
    pub summary:      Option<RunSummary>,
    pub report:       Option<ModelReport>,
}

impl RunArtifacts {
    pub fn from_raw(raw: RawTables) -> Self {
        Self { raw: Some(raw), ..Self::default() }
    }
}

/// The contract every stage must fulfill.
pub trait PipelineStage {
    /// Unique stable name, used in logs and the stage log table.
    fn name(&self) -> &'static str;

    /// Called once per run by the pipeline.
    ///
    /// - `ctx`:       run id, configuration and store
    /// - `artifacts`: outputs of earlier stages; the stage adds its own
    /// - `rng`:       this stage's deterministic RNG
    fn run(
        &mut self,
        ctx: &StageContext<'_>,
        artifacts: &mut RunArtifacts,
        rng: &mut StageRng,
    ) -> PipelineResult<StageOutcome>;
}
