use crate::cli::CheckArgs;
use crate::config::PartialPredictionConfig;
use crate::error::Result;
use quatfold::core::models::residue::parse_sequence;
use quatfold::engine::config::PredictionConfig;
use quatfold::engine::error::EngineError;
use quatfold::engine::priors::{Priors, secondary_structure_string};
use std::fmt::Write;

pub fn run(args: CheckArgs) -> Result<()> {
    let config = PartialPredictionConfig::from_optional_file(args.config.as_deref())?
        .resolve(&args.set_values)?;
    print!("{}", report(&config, args.sequence.as_deref())?);
    Ok(())
}

/// Human-readable account of the resolved configuration and, for a sequence, its priors.
fn report(config: &PredictionConfig, sequence: Option<&str>) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "Configuration is valid.");
    let _ = writeln!(out, "  seed: {}", config.seed);
    for kind in config.sampling.active() {
        let _ = writeln!(out, "  sampler {}: {} sample(s)", kind, config.sampling.samples(kind));
    }

    let Some(sequence) = sequence else {
        return Ok(out);
    };
    let residues = parse_sequence(sequence).map_err(EngineError::from)?;
    let priors = Priors::resolve(&residues, &config.priors).map_err(EngineError::from)?;

    let n = residues.len();
    let strategy = config.minimization.strategy_for(n);
    let budget = config.minimization.effective_budget(strategy, n);
    let _ = writeln!(out, "  residues: {n}");
    let _ = writeln!(out, "  minimizer: {strategy} ({budget} iterations)");
    let _ = writeln!(out, "  prior source: {:?}", priors.source());
    if let Some(states) = priors.secondary_structure() {
        let _ = writeln!(out, "  secondary structure: {}", secondary_structure_string(states));
    }
    let _ = writeln!(out, "  contacts: {}", priors.contacts().len());
    Ok(out)
}
