use crate::cli::PredictArgs;
use crate::config::PartialPredictionConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use quatfold::core::models::parsed::ParsedStructure;
use quatfold::engine::cancel::CancellationToken;
use quatfold::engine::progress::ProgressReporter;
use quatfold::workflows::predict::{self, PredictionResult};
use std::path::Path;
use tracing::info;

pub fn run(args: PredictArgs) -> Result<()> {
    let partial_config = PartialPredictionConfig::from_optional_file(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    let reference = args
        .reference
        .as_deref()
        .map(|path| {
            info!("Loading reference structure from {:?}", path);
            ParsedStructure::load(path).map_err(|e| CliError::FileParsing {
                path: path.to_path_buf(),
                source: e.into(),
            })
        })
        .transpose()?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.callback());
    let cancel = CancellationToken::new();

    eprintln!("Predicting structure for {} residue(s)...", args.sequence.trim().len());
    let result = predict::run(&args.sequence, &config, reference.as_ref(), &reporter, &cancel)?;

    info!(
        candidates = result.candidates.len(),
        rejected = result.summary.rejected,
        "Workflow finished."
    );
    write_outputs(&result, args.output.as_deref(), args.structure_output.as_deref())
}

fn write_outputs(
    result: &PredictionResult,
    summary_path: Option<&Path>,
    structure_path: Option<&Path>,
) -> Result<()> {
    let summary = toml::to_string_pretty(&result.summary)
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to serialize summary: {}", e)))?;
    match summary_path {
        Some(path) => {
            std::fs::write(path, &summary)?;
            println!("Summary written to: {}", path.display());
        }
        None => print!("{summary}"),
    }

    if let Some(path) = structure_path {
        let parsed = ParsedStructure::from(result.best.structure());
        let text = toml::to_string_pretty(&parsed).map_err(|e| {
            CliError::Other(anyhow::anyhow!("Failed to serialize structure: {}", e))
        })?;
        std::fs::write(path, text)?;
        println!(
            "✓ Best structure ({}, {:.4} kcal/mol) written to: {}",
            result.best.method(),
            result.best.energy().total,
            path.display()
        );
    }
    Ok(())
}
