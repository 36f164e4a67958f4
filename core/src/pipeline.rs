//! The pipeline: runs every stage once, in a fixed order.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Preprocess      raw tables → normalized offers, customers, events
//!   2. Attribution     exposure windows, completion, spend
//!   3. ViewDetection   view classification → attributed offer table
//!   4. Dataset         binning plan + feature/target table
//!   5. Summary         completion rates per group, customer activity
//!   6. Trainer         decision-tree grid search and evaluation
//!
//! RULES:
//!   - Stages execute in registration order.
//!   - A stage reads only artifacts left by earlier stages.
//!   - All randomness flows through the RngBank.
//!   - Every stage start, completion and failure is recorded in the stage log.
//!   - The first failing stage halts the run.

use crate::{
    attribution::AttributionStage,
    config::PipelineConfig,
    dataset::DatasetStage,
    error::PipelineResult,
    input::RawTables,
    model::TrainerStage,
    preprocess::PreprocessStage,
    rng::{RngBank, StageSlot},
    stage::{PipelineStage, RunArtifacts, StageContext},
    store::PipelineStore,
    summary::SummaryStage,
    types::RunId,
    view_detection::ViewDetectionStage,
};

pub struct Pipeline<'a> {
    pub run_id:   RunId,
    pub config:   PipelineConfig,
    pub rng_bank: RngBank,
    stages:       Vec<(StageSlot, Box<dyn PipelineStage>)>,
    store:        &'a PipelineStore,
}

impl<'a> Pipeline<'a> {
    /// An empty pipeline. A fresh run id is generated when none is given.
    pub fn new(run_id: Option<RunId>, config: PipelineConfig, store: &'a PipelineStore) -> Self {
        Self {
            run_id:   run_id.unwrap_or_else(|| format!("run-{}", uuid::Uuid::new_v4())),
            rng_bank: RngBank::new(config.seed),
            config,
            stages:   Vec::new(),
            store,
        }
    }

    /// Build a fully wired pipeline with all stages registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build(run_id: Option<RunId>, config: PipelineConfig, store: &'a PipelineStore) -> Self {
        let mut pipeline = Pipeline::new(run_id, config, store);

        // EXECUTION ORDER — fixed, documented, never reordered.
        pipeline.register(StageSlot::Preprocess, Box::new(PreprocessStage));
        pipeline.register(StageSlot::Attribution, Box::new(AttributionStage));
        pipeline.register(StageSlot::ViewDetection, Box::new(ViewDetectionStage));
        pipeline.register(StageSlot::Dataset, Box::new(DatasetStage));
        pipeline.register(StageSlot::Summary, Box::new(SummaryStage));
        pipeline.register(StageSlot::Trainer, Box::new(TrainerStage));
        pipeline
    }

    /// Register a stage. Call in the documented execution order.
    pub fn register(&mut self, slot: StageSlot, stage: Box<dyn PipelineStage>) {
        self.stages.push((slot, stage));
    }

    /// Load the configured input files, then run every stage.
    pub fn run(&mut self) -> PipelineResult<RunArtifacts> {
        let raw = RawTables::load(&self.config.inputs)?;
        self.run_from_raw(raw)
    }

    /// Run every registered stage over already-loaded tables.
    pub fn run_from_raw(&mut self, raw: RawTables) -> PipelineResult<RunArtifacts> {
        let config_json = serde_json::to_string(&self.config)?;
        self.store.insert_run(&self.run_id, self.config.seed, env!("CARGO_PKG_VERSION"), &config_json)?;
        log::info!("pipeline: run {} (seed {})", self.run_id, self.config.seed);

        let ctx = StageContext {
            run_id: &self.run_id,
            config: &self.config,
            store:  self.store,
        };
        let mut artifacts = RunArtifacts::from_raw(raw);

        for (seq, (slot, stage)) in self.stages.iter_mut().enumerate() {
            let name = stage.name();
            let mut rng = self.rng_bank.for_stage(*slot);
            self.store.append_stage_log(&self.run_id, seq, name, "started", None, None)?;
            log::debug!("pipeline: stage {name} started");

            match stage.run(&ctx, &mut artifacts, &mut rng) {
                Ok(outcome) => {
                    self.store.append_stage_log(
                        &self.run_id,
                        seq,
                        name,
                        "completed",
                        Some((outcome.rows_out, outcome.rows_dropped)),
                        None,
                    )?;
                }
                Err(e) => {
                    let detail = e.to_string();
                    self.store.append_stage_log(&self.run_id, seq, name, "failed", None, Some(&detail))?;
                    log::error!("pipeline: stage {name} failed: {detail}");
                    return Err(e);
                }
            }
        }

        Ok(artifacts)
    }
}
