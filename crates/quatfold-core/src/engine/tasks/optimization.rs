use super::selection::selection_score;
use crate::core::forcefield::energy::PreparedEnergy;
use crate::core::models::structure::Structure;
use crate::core::validation::{score_quality, validate};
use crate::engine::context::PredictionContext;
use crate::engine::error::EngineError;
use crate::engine::minimizer::{EnergyObjective, flatten, minimize, unflatten};
use crate::engine::progress::Progress;
use crate::engine::rng::{MINIMIZER_STREAM, stream_rng};
use crate::engine::state::{AngleSet, Candidate, Ensemble, MinimizationSummary};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug)]
enum MemberOutcome {
    Accepted(Candidate),
    Rejected(String),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct OptimizationOutput {
    /// Surviving candidates in ensemble order.
    pub candidates: Vec<Candidate>,
    pub rejected: usize,
}

/// Builds, minimizes, re-validates and scores every ensemble member.
///
/// Members whose structure fails validation before or after minimization are rejected,
/// not fatal. Each member minimizes on its own RNG stream keyed by its ensemble index.
#[instrument(skip_all, name = "optimization_task")]
pub fn run(
    context: &PredictionContext<'_>,
    ensemble: &Ensemble,
) -> Result<OptimizationOutput, EngineError> {
    info!(members = ensemble.len(), "Optimizing candidates.");
    context.reporter.report(Progress::TaskStart {
        total_steps: ensemble.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = ensemble.members().iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = ensemble.members().par_iter().enumerate();

    let outcomes: Vec<Result<MemberOutcome, EngineError>> = iterator
        .map(|(index, member)| -> Result<MemberOutcome, EngineError> {
            if context.cancel.is_cancelled() {
                return Ok(MemberOutcome::Skipped);
            }
            let outcome = optimize_member(context, index, member)?;
            if let MemberOutcome::Rejected(reason) = &outcome {
                context.reporter.report(Progress::CandidateRejected {
                    index,
                    reason: reason.clone(),
                });
            }
            context.reporter.report(Progress::TaskIncrement);
            Ok(outcome)
        })
        .collect();

    context.reporter.report(Progress::TaskFinish);

    let mut candidates = Vec::with_capacity(outcomes.len());
    let mut rejected = 0;
    for outcome in outcomes {
        match outcome? {
            MemberOutcome::Accepted(candidate) => candidates.push(candidate),
            MemberOutcome::Rejected(_) => rejected += 1,
            MemberOutcome::Skipped => {}
        }
    }

    info!(
        survivors = candidates.len(),
        rejected, "Optimization finished."
    );
    Ok(OptimizationOutput {
        candidates,
        rejected,
    })
}

fn optimize_member(
    context: &PredictionContext<'_>,
    index: usize,
    member: &AngleSet,
) -> Result<MemberOutcome, EngineError> {
    let built = context.builder.build(context.sequence, &member.angles)?;
    if let Some(reason) = built.report.reason {
        debug!(index, %reason, "Rejected before minimization.");
        return Ok(MemberOutcome::Rejected(reason.to_string()));
    }
    let mut structure = built.structure;

    let prepared = context.energy.prepare(&structure)?;
    let config = &context.config.minimization;
    let residue_count = structure.residue_count();
    let strategy = config.strategy_for(residue_count);
    let budget = config.budget_for(residue_count);

    let objective = EnergyObjective::new(&prepared);
    let mut rng = stream_rng(context.config.seed, MINIMIZER_STREAM, index as u64);
    let report = minimize(
        &objective,
        flatten(&structure.positions()),
        strategy,
        config,
        budget,
        &mut rng,
    );

    if let Err(e) = structure.set_positions(&unflatten(&report.outcome.x)) {
        return Ok(MemberOutcome::Rejected(e.to_string()));
    }
    if let Some(reason) = validate(&structure).reason {
        debug!(index, %reason, "Rejected after minimization.");
        return Ok(MemberOutcome::Rejected(reason.to_string()));
    }

    let summary = MinimizationSummary {
        strategy: report.strategy,
        state: report.outcome.state,
        iterations: report.outcome.iterations,
        initial_energy: report.outcome.initial_energy(),
        final_energy: report.outcome.final_energy(),
        fell_back: report.fell_back,
        abort_reason: report.outcome.abort_reason,
    };
    Ok(MemberOutcome::Accepted(score_candidate(
        context, index, member, structure, &prepared, summary,
    )))
}

fn score_candidate(
    context: &PredictionContext<'_>,
    index: usize,
    member: &AngleSet,
    structure: Structure,
    prepared: &PreparedEnergy,
    summary: MinimizationSummary,
) -> Candidate {
    let energy = prepared.breakdown(&structure.positions());
    let quality = score_quality(&structure, context.config.limits.severe_clash_distance);
    let heuristic = context.heuristic_penalty(&structure.backbone_angles());
    let score = selection_score(&context.config.scoring, energy.total, quality, heuristic);
    Candidate::new(
        member.method,
        index,
        structure,
        energy,
        quality,
        heuristic,
        summary,
        score,
    )
}
