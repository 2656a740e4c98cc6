use crate::core::forcefield::energy::EnergyModel;
use crate::core::forcefield::term::EnergyBreakdown;
use crate::core::heuristics::ConformationHeuristic;
use crate::core::models::builder::BackboneBuilder;
use crate::core::models::parsed::ParsedStructure;
use crate::core::models::residue::{AminoAcid, parse_sequence, sequence_string};
use crate::core::models::structure::Structure;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::PredictionConfig;
use crate::engine::context::PredictionContext;
use crate::engine::error::EngineError;
use crate::engine::priors::Priors;
use crate::engine::progress::ProgressReporter;
use crate::engine::samplers::fragments::FragmentLibrary;
use crate::engine::samplers::{ConformationSampler, create_samplers};
use crate::engine::state::{Candidate, Ensemble, MinimizationSummary, SamplerKind};
use crate::engine::tasks;
use crate::engine::tasks::optimization::OptimizationOutput;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub best: Candidate,
    /// Every surviving candidate, best first.
    pub candidates: Vec<Candidate>,
    pub ensemble: Ensemble,
    pub summary: PredictionSummary,
}

/// Serializable digest of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PredictionSummary {
    pub sequence: String,
    pub seed: u64,
    pub best_method: SamplerKind,
    pub best_score: f64,
    pub best_energy: f64,
    pub best_quality: f64,
    pub reference_rmsd: Option<f64>,
    pub sampled: usize,
    pub rejected: usize,
    /// Surviving candidates per sampler.
    pub survivors: BTreeMap<String, usize>,
    pub energy: EnergyBreakdown,
    pub minimization: MinimizationSummary,
}

/// Inputs fixed for the whole run.
struct RunInputs<'a> {
    sequence: Vec<AminoAcid>,
    config: &'a PredictionConfig,
    builder: BackboneBuilder,
    heuristic: Option<Box<dyn ConformationHeuristic>>,
    reference: Option<Structure>,
    reporter: &'a ProgressReporter<'a>,
    cancel: &'a CancellationToken,
}

/// Outputs of the Predict phase used by every later phase.
struct RunPlan {
    priors: Priors,
    energy: EnergyModel,
    samplers: Vec<Box<dyn ConformationSampler>>,
}

impl RunInputs<'_> {
    fn context<'s>(&'s self, plan: &'s RunPlan) -> PredictionContext<'s> {
        PredictionContext {
            sequence: &self.sequence,
            config: self.config,
            priors: &plan.priors,
            builder: &self.builder,
            energy: &plan.energy,
            heuristic: self.heuristic.as_deref(),
            reporter: self.reporter,
            cancel: self.cancel,
        }
    }
}

enum PipelineState {
    Predict,
    Sample {
        plan: RunPlan,
    },
    Optimize {
        plan: RunPlan,
        ensemble: Ensemble,
    },
    Select {
        plan: RunPlan,
        ensemble: Ensemble,
        optimized: OptimizationOutput,
    },
    Finished(Box<PredictionResult>),
    Failed(EngineError),
}

impl PipelineState {
    fn name(&self) -> &'static str {
        match self {
            PipelineState::Predict => "Predict",
            PipelineState::Sample { .. } => "Sample",
            PipelineState::Optimize { .. } => "Optimize",
            PipelineState::Select { .. } => "Select",
            PipelineState::Finished(_) => "Finished",
            PipelineState::Failed(_) => "Failed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Finished(_) | PipelineState::Failed(_))
    }

    /// Runs the current phase and returns the next state. Terminal states are fixed points.
    fn advance(self, inputs: &RunInputs<'_>) -> PipelineState {
        if self.is_terminal() {
            return self;
        }
        if inputs.cancel.is_cancelled() {
            return PipelineState::Failed(EngineError::Cancelled);
        }

        let name = self.name();
        let next = inputs.reporter.phase(name, || match self {
            PipelineState::Predict => predict(inputs).map(|plan| PipelineState::Sample { plan }),
            PipelineState::Sample { plan } => {
                sample(inputs, &plan).map(|ensemble| PipelineState::Optimize { plan, ensemble })
            }
            PipelineState::Optimize { plan, ensemble } => optimize(inputs, &plan, &ensemble)
                .map(|optimized| PipelineState::Select {
                    plan,
                    ensemble,
                    optimized,
                }),
            PipelineState::Select {
                plan,
                ensemble,
                optimized,
            } => select(inputs, &plan, ensemble, optimized)
                .map(|result| PipelineState::Finished(Box::new(result))),
            terminal => Ok(terminal),
        });
        next.unwrap_or_else(PipelineState::Failed)
    }
}

/// Predicts a backbone structure for `sequence`.
///
/// `reference`, when given, is only used to report the best candidate's CA RMSD. The
/// run stops dispatching further work once `cancel` is triggered and then fails with
/// [`EngineError::Cancelled`].
#[instrument(skip_all, name = "prediction_workflow")]
pub fn run(
    sequence: &str,
    config: &PredictionConfig,
    reference: Option<&ParsedStructure>,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<PredictionResult, EngineError> {
    config.validate()?;
    with_thread_pool(config.threads, || {
        execute(sequence, config, reference, reporter, cancel)
    })
}

fn execute(
    sequence: &str,
    config: &PredictionConfig,
    reference: Option<&ParsedStructure>,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<PredictionResult, EngineError> {
    let sequence = parse_sequence(sequence)?;
    let reference = reference.map(ParsedStructure::to_structure).transpose()?;
    info!(
        residues = sequence.len(),
        seed = config.seed,
        "Starting prediction workflow."
    );

    let inputs = RunInputs {
        sequence,
        config,
        builder: BackboneBuilder::new(config.geometry).with_hydrogens(config.include_hydrogens),
        heuristic: config.scoring.heuristic.map(|kind| kind.create()),
        reference,
        reporter,
        cancel,
    };

    let mut state = PipelineState::Predict;
    loop {
        state = match state.advance(&inputs) {
            PipelineState::Finished(result) => {
                info!(
                    method = %result.summary.best_method,
                    energy = result.summary.best_energy,
                    "Workflow complete."
                );
                return Ok(*result);
            }
            PipelineState::Failed(error) => {
                warn!(%error, "Workflow failed.");
                return Err(error);
            }
            next => next,
        };
    }
}

#[cfg(feature = "parallel")]
fn with_thread_pool<T, F>(threads: Option<usize>, f: F) -> Result<T, EngineError>
where
    T: Send,
    F: FnOnce() -> Result<T, EngineError> + Send,
{
    match threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?
            .install(f),
        None => f(),
    }
}

#[cfg(not(feature = "parallel"))]
fn with_thread_pool<T, F>(_threads: Option<usize>, f: F) -> Result<T, EngineError>
where
    F: FnOnce() -> Result<T, EngineError>,
{
    f()
}

fn predict(inputs: &RunInputs<'_>) -> Result<RunPlan, EngineError> {
    let config = inputs.config;
    let priors = Priors::resolve(&inputs.sequence, &config.priors)?;
    info!(
        source = ?priors.source(),
        contacts = priors.contacts().len(),
        "Priors resolved."
    );

    let energy = EnergyModel::new(config.forcefield.clone(), config.scoring.cutoffs, config.limits)
        .with_restraints(priors.contacts().to_vec());

    let library = match &config.sampling.fragments.library_path {
        Some(path) if config.sampling.is_enabled(SamplerKind::Fragment) => {
            FragmentLibrary::load(path)?
        }
        _ => FragmentLibrary::built_in(),
    };
    let samplers = create_samplers(&config.sampling, Arc::new(library));

    Ok(RunPlan {
        priors,
        energy,
        samplers,
    })
}

fn sample(inputs: &RunInputs<'_>, plan: &RunPlan) -> Result<Ensemble, EngineError> {
    let ensemble = tasks::sampling::run(&inputs.context(plan), &plan.samplers)?;
    if inputs.cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    if ensemble.is_empty() {
        return Err(EngineError::NoCandidates {
            phase: "Sample",
            rejected: 0,
        });
    }
    Ok(ensemble)
}

fn optimize(
    inputs: &RunInputs<'_>,
    plan: &RunPlan,
    ensemble: &Ensemble,
) -> Result<OptimizationOutput, EngineError> {
    let optimized = tasks::optimization::run(&inputs.context(plan), ensemble)?;
    if inputs.cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    if optimized.candidates.is_empty() {
        return Err(EngineError::NoCandidates {
            phase: "Optimize",
            rejected: optimized.rejected,
        });
    }
    Ok(optimized)
}

fn select(
    inputs: &RunInputs<'_>,
    plan: &RunPlan,
    ensemble: Ensemble,
    optimized: OptimizationOutput,
) -> Result<PredictionResult, EngineError> {
    let rejected = optimized.rejected;
    let selection = tasks::selection::run(
        &inputs.context(plan),
        optimized.candidates,
        inputs.reference.as_ref(),
    );
    let Some(best) = selection.ranked.first().cloned() else {
        return Err(EngineError::NoCandidates {
            phase: "Select",
            rejected,
        });
    };

    let mut survivors = BTreeMap::new();
    for candidate in &selection.ranked {
        *survivors
            .entry(candidate.method().name().to_string())
            .or_insert(0) += 1;
    }

    let summary = PredictionSummary {
        sequence: sequence_string(&inputs.sequence),
        seed: inputs.config.seed,
        best_method: best.method(),
        best_score: best.score(),
        best_energy: best.energy().total,
        best_quality: best.quality(),
        reference_rmsd: selection.reference_rmsd,
        sampled: ensemble.len(),
        rejected,
        survivors,
        energy: *best.energy(),
        minimization: *best.minimization(),
    };

    Ok(PredictionResult {
        best,
        candidates: selection.ranked,
        ensemble,
        summary,
    })
}
