use crate::core::geometry::spatial::superposed_rmsd;
use crate::core::models::structure::Structure;
use crate::engine::config::ScoringConfig;
use crate::engine::context::PredictionContext;
use crate::engine::progress::Progress;
use crate::engine::state::Candidate;
use std::cmp::Ordering;
use tracing::{info, instrument, warn};

/// Selection score: `energy + quality_penalty·(1 - quality) + heuristic_weight·heuristic`.
///
/// The heuristic term contributes only when a plug-in is configured.
pub fn selection_score(scoring: &ScoringConfig, energy: f64, quality: f64, heuristic: Option<f64>) -> f64 {
    let heuristic_term = heuristic
        .map(|h| scoring.effective_heuristic_weight() * h)
        .unwrap_or(0.0);
    energy + scoring.quality_penalty * (1.0 - quality) + heuristic_term
}

/// Total order over candidates: score, then energy, then sampler, then ensemble index.
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.score()
        .total_cmp(&b.score())
        .then_with(|| a.energy().total.total_cmp(&b.energy().total))
        .then_with(|| a.method().cmp(&b.method()))
        .then_with(|| a.ensemble_index().cmp(&b.ensemble_index()))
}

#[derive(Debug, Clone)]
pub struct Selection {
    /// Candidates best first.
    pub ranked: Vec<Candidate>,
    /// Kabsch-superposed CA RMSD of the best candidate to the reference.
    pub reference_rmsd: Option<f64>,
}

#[instrument(skip_all, name = "selection_task")]
pub fn run(
    context: &PredictionContext<'_>,
    mut candidates: Vec<Candidate>,
    reference: Option<&Structure>,
) -> Selection {
    context.reporter.report(Progress::TaskStart { total_steps: 1 });
    candidates.sort_by(rank_order);

    let reference_rmsd = match (reference, candidates.first()) {
        (Some(reference), Some(best)) => ca_rmsd(reference, best.structure()),
        _ => None,
    };

    if let Some(best) = candidates.first() {
        info!(
            method = %best.method(),
            score = best.score(),
            energy = best.energy().total,
            quality = best.quality(),
            rmsd = ?reference_rmsd,
            "Selected best candidate."
        );
    }
    context.reporter.report(Progress::TaskIncrement);
    context.reporter.report(Progress::TaskFinish);

    Selection {
        ranked: candidates,
        reference_rmsd,
    }
}

fn ca_rmsd(reference: &Structure, structure: &Structure) -> Option<f64> {
    let expected = reference.ca_positions();
    let actual = structure.ca_positions();
    if expected.len() != actual.len() {
        warn!(
            reference = expected.len(),
            predicted = actual.len(),
            "Reference has a different number of CA atoms; skipping RMSD."
        );
        return None;
    }
    superposed_rmsd(&expected, &actual)
}
