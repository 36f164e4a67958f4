//! pipeline-runner: headless runner for the offer attribution pipeline.
//!
//! Usage:
//!   pipeline-runner --data-dir ./data
//!   pipeline-runner --config pipeline.json --db run.db --seed 7 --export attributed.jsonl

use anyhow::{Context, Result};
use offer_attribution_core::{
    config::PipelineConfig,
    pipeline::Pipeline,
    stage::RunArtifacts,
    store::PipelineStore,
};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let export = flag_value(&args, "--export");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = flag_value(&args, "--data-dir") {
        config.inputs = PipelineConfig::for_data_dir(dir).inputs;
    }
    config.seed = parse_arg(&args, "--seed", config.seed);

    println!("Offer attribution — pipeline-runner");
    println!("  portfolio:   {}", config.inputs.portfolio);
    println!("  profile:     {}", config.inputs.profile);
    println!("  transcript:  {}", config.inputs.transcript);
    println!("  seed:        {}", config.seed);
    println!("  db:          {db}");
    println!();

    let store = PipelineStore::open(db)?;
    store.migrate()?;

    let mut pipeline = Pipeline::build(None, config, &store);
    let artifacts = pipeline.run()?;
    let run_id = pipeline.run_id.clone();

    if let Some(path) = export {
        export_attributed(&artifacts, path)?;
        println!("  exported attributed table to {path}");
    }

    print_summary(&store, &run_id, &artifacts)
}

/// One JSON object per line, in table order.
fn export_attributed(artifacts: &RunArtifacts, path: &str) -> Result<()> {
    let rows = artifacts.attributed.as_deref().unwrap_or_default();
    let file = File::create(path).with_context(|| format!("Cannot create {path}"))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    log::info!("export: {} rows written to {path}", rows.len());
    Ok(())
}

fn print_summary(store: &PipelineStore, run_id: &str, artifacts: &RunArtifacts) -> Result<()> {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:              {run_id}");
    println!("  offers:              {}", store.offer_count(run_id)?);
    println!("  customers:           {}", store.customer_count(run_id)?);
    println!("  events:              {}", store.event_count(run_id)?);
    println!("  attributed offers:   {}", store.attributed_count(run_id)?);
    println!("  completed + viewed:  {}", store.completed_viewed_count(run_id)?);

    println!();
    println!("=== STAGES ===");
    for entry in store.stage_log(run_id)?.iter().filter(|e| e.status == "completed") {
        println!(
            "  {:<16} rows out {:>8}  dropped {:>6}",
            entry.stage,
            entry.rows_out.unwrap_or_default(),
            entry.rows_dropped.unwrap_or_default()
        );
    }

    println!();
    println!("=== CUSTOMER ACTIVITY ===");
    for (class, count) in store.activity_counts(run_id)? {
        println!("  {class:<26} {count}");
    }

    if let Some(summary) = &artifacts.summary {
        println!();
        println!("=== COMPLETION RATE BY OFFER ===");
        for rate in summary
            .group_rates
            .iter()
            .filter(|r| r.dimension == "offer_name" && r.scope.as_str() == "all")
        {
            println!("  {:<20} {:>6} offers  OCR {:.3}", rate.group, rate.offers, rate.rate);
        }
    }

    println!();
    println!("=== MODEL ===");
    match store.model_report(run_id)? {
        Some(report) => {
            println!(
                "  best params:  depth {} / split {} / leaf {}",
                report.best_params.max_depth,
                report.best_params.min_samples_split,
                report.best_params.min_samples_leaf
            );
            println!("  cv f1:        {:.4}", report.cv_f1);
            println!("  test f1:      {:.4}", report.f1);
            println!("  accuracy:     {:.4}", report.accuracy);
            match report.roc_auc {
                Some(auc) => println!("  roc auc:      {auc:.4}"),
                None => println!("  roc auc:      n/a (single-class test split)"),
            }
            println!("  rows:         {} train / {} test", report.train_rows, report.test_rows);
            for (feature, importance) in store.top_features(run_id, 10)? {
                println!("    {feature:<28} {importance:.4}");
            }
        }
        None => println!("  (no model report)"),
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
