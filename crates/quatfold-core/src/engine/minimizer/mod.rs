//! Energy minimization of candidate coordinates.
//!
//! All strategies work on a flat coordinate vector through the [`Objective`] trait and
//! report a [`MinimizationOutcome`] whose `trace` holds the energy after every accepted
//! step. Runs move through [`RunState::Initialized`] and [`RunState::Stepping`] and end in
//! [`RunState::Converged`] or [`RunState::Aborted`].
//!
//! [`minimize`] is the driver used by the pipeline. It runs the requested strategy, falls
//! back to gentle relaxation when a quasi-Newton run aborts, and chains annealing with a
//! quasi-Newton polish in hybrid mode.

pub mod annealing;
pub mod convergence;
pub mod gentle;
pub mod lbfgs;

use crate::core::forcefield::energy::PreparedEnergy;
use annealing::AnnealingParams;
use gentle::GentleParams;
use lbfgs::LbfgsParams;
use nalgebra::{DVector, Point3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub(crate) const COORDS_PER_ATOM: usize = 3;

/// Largest structure minimized with the hybrid strategy under auto selection.
pub const HYBRID_MAX_RESIDUES: usize = 24;
/// Largest structure minimized with L-BFGS under auto selection.
pub const LBFGS_MAX_RESIDUES: usize = 96;

const ITERATIONS_PER_SQRT_RESIDUE: f64 = 40.0;
const MIN_AUTO_ITERATIONS: usize = 50;
const MAX_AUTO_ITERATIONS: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MinimizerStrategy {
    Gentle,
    Lbfgs,
    Annealing,
    Hybrid,
}

impl MinimizerStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            MinimizerStrategy::Gentle => "gentle",
            MinimizerStrategy::Lbfgs => "lbfgs",
            MinimizerStrategy::Annealing => "annealing",
            MinimizerStrategy::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for MinimizerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown minimizer strategy '{0}' (expected gentle, lbfgs, annealing or hybrid)")]
pub struct ParseStrategyError(pub String);

impl FromStr for MinimizerStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gentle" | "steepest-descent" => Ok(MinimizerStrategy::Gentle),
            "lbfgs" | "l-bfgs" | "quasi-newton" => Ok(MinimizerStrategy::Lbfgs),
            "annealing" | "simulated-annealing" => Ok(MinimizerStrategy::Annealing),
            "hybrid" => Ok(MinimizerStrategy::Hybrid),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

/// Size-based strategy choice.
pub fn select_strategy(residue_count: usize) -> MinimizerStrategy {
    if residue_count <= HYBRID_MAX_RESIDUES {
        MinimizerStrategy::Hybrid
    } else if residue_count <= LBFGS_MAX_RESIDUES {
        MinimizerStrategy::Lbfgs
    } else {
        MinimizerStrategy::Gentle
    }
}

/// Iteration budget proportional to the square root of the residue count.
pub fn auto_iteration_budget(residue_count: usize) -> usize {
    let scaled = (ITERATIONS_PER_SQRT_RESIDUE * (residue_count as f64).sqrt()).ceil() as usize;
    scaled.clamp(MIN_AUTO_ITERATIONS, MAX_AUTO_ITERATIONS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Initialized,
    Stepping,
    Converged,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortReason {
    /// The energy or gradient became NaN or infinite.
    NonFinite,
    /// The energy grew beyond the divergence threshold.
    Diverged,
    /// No step along a descent direction satisfied sufficient decrease.
    LineSearchFailed,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NonFinite => f.write_str("non-finite energy"),
            AbortReason::Diverged => f.write_str("energy diverged"),
            AbortReason::LineSearchFailed => f.write_str("line search failed"),
        }
    }
}

/// A differentiable scalar function of a flat coordinate vector.
pub trait Objective {
    fn dimension(&self) -> usize;

    /// The objective at `x`. May be non-finite.
    fn value(&self, x: &DVector<f64>) -> f64;

    fn value_and_gradient(&self, x: &DVector<f64>) -> (f64, DVector<f64>);
}

/// The uncapped total energy of a prepared structure as an [`Objective`].
pub struct EnergyObjective<'a> {
    prepared: &'a PreparedEnergy,
}

impl<'a> EnergyObjective<'a> {
    pub fn new(prepared: &'a PreparedEnergy) -> Self {
        Self { prepared }
    }
}

impl Objective for EnergyObjective<'_> {
    fn dimension(&self) -> usize {
        self.prepared.atom_count() * COORDS_PER_ATOM
    }

    fn value(&self, x: &DVector<f64>) -> f64 {
        self.prepared.raw_energy(&unflatten(x)).total()
    }

    fn value_and_gradient(&self, x: &DVector<f64>) -> (f64, DVector<f64>) {
        let (energy, gradient) = self.prepared.energy_and_gradient(&unflatten(x));
        let flat = DVector::from_iterator(
            gradient.len() * COORDS_PER_ATOM,
            gradient.iter().flat_map(|g| [g.x, g.y, g.z]),
        );
        (energy.total(), flat)
    }
}

pub fn flatten(positions: &[Point3<f64>]) -> DVector<f64> {
    DVector::from_iterator(
        positions.len() * COORDS_PER_ATOM,
        positions.iter().flat_map(|p| [p.x, p.y, p.z]),
    )
}

pub fn unflatten(x: &DVector<f64>) -> Vec<Point3<f64>> {
    x.as_slice()
        .chunks_exact(COORDS_PER_ATOM)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect()
}

/// Largest Euclidean norm over consecutive 3-component blocks of `v`.
pub(crate) fn max_block_norm(v: &DVector<f64>) -> f64 {
    v.as_slice()
        .chunks(COORDS_PER_ATOM)
        .map(|c| c.iter().map(|x| x * x).sum::<f64>().sqrt())
        .fold(0.0, f64::max)
}

pub(crate) fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[derive(Debug, Clone)]
pub struct MinimizationOutcome {
    pub x: DVector<f64>,
    pub state: RunState,
    pub iterations: usize,
    /// Energy at the start and after every accepted step.
    pub trace: Vec<f64>,
    pub abort_reason: Option<AbortReason>,
}

impl MinimizationOutcome {
    pub(crate) fn aborted(x: DVector<f64>, energy: f64, reason: AbortReason) -> Self {
        Self {
            x,
            state: RunState::Aborted,
            iterations: 0,
            trace: vec![energy],
            abort_reason: Some(reason),
        }
    }

    pub fn initial_energy(&self) -> f64 {
        self.trace.first().copied().unwrap_or(f64::NAN)
    }

    pub fn final_energy(&self) -> f64 {
        self.trace.last().copied().unwrap_or(f64::NAN)
    }
}

/// Tuning shared by every minimizer run of a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizationConfig {
    /// `None` selects by structure size.
    pub strategy: Option<MinimizerStrategy>,
    /// `None` derives the budget from the residue count.
    pub max_iterations: Option<usize>,
    /// Energy change in kcal/mol regarded as "unchanged".
    pub tolerance: f64,
    /// Consecutive unchanged steps required for convergence.
    pub patience: usize,
    pub gentle: GentleParams,
    pub lbfgs: LbfgsParams,
    pub annealing: AnnealingParams,
}

impl Default for MinimizationConfig {
    fn default() -> Self {
        Self {
            strategy: None,
            max_iterations: None,
            tolerance: 0.1,
            patience: 5,
            gentle: GentleParams::default(),
            lbfgs: LbfgsParams::default(),
            annealing: AnnealingParams::default(),
        }
    }
}

impl MinimizationConfig {
    pub fn strategy_for(&self, residue_count: usize) -> MinimizerStrategy {
        self.strategy.unwrap_or_else(|| select_strategy(residue_count))
    }

    pub fn budget_for(&self, residue_count: usize) -> usize {
        self.max_iterations
            .unwrap_or_else(|| auto_iteration_budget(residue_count))
    }

    /// The iteration limit `strategy` actually runs under for a chain of `residue_count`.
    ///
    /// Gentle relaxation is additionally capped by its own step limit.
    pub fn effective_budget(&self, strategy: MinimizerStrategy, residue_count: usize) -> usize {
        let budget = self.budget_for(residue_count);
        match strategy {
            MinimizerStrategy::Gentle => budget.min(self.gentle.max_steps),
            _ => budget,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MinimizationReport {
    pub strategy: MinimizerStrategy,
    pub outcome: MinimizationOutcome,
    pub fell_back: bool,
}

/// Runs `strategy` from `x0` within `budget` iterations.
pub fn minimize<O: Objective, R: Rng>(
    objective: &O,
    x0: DVector<f64>,
    strategy: MinimizerStrategy,
    config: &MinimizationConfig,
    budget: usize,
    rng: &mut R,
) -> MinimizationReport {
    let (outcome, fell_back) = match strategy {
        MinimizerStrategy::Gentle => {
            let relaxed = gentle::relax(
                objective,
                x0,
                &config.gentle,
                config.tolerance,
                config.patience,
                budget,
            );
            (relaxed, false)
        }
        MinimizerStrategy::Lbfgs => guarded_quasi_newton(objective, x0, config, budget),
        MinimizerStrategy::Annealing => {
            let annealed = annealing::anneal(objective, x0, &config.annealing, config, budget, None, rng);
            (annealed, false)
        }
        MinimizerStrategy::Hybrid => hybrid(objective, x0, config, budget, rng),
    };
    MinimizationReport {
        strategy,
        outcome,
        fell_back,
    }
}

fn guarded_quasi_newton<O: Objective>(
    objective: &O,
    x0: DVector<f64>,
    config: &MinimizationConfig,
    budget: usize,
) -> (MinimizationOutcome, bool) {
    let params = LbfgsParams {
        guarded: true,
        ..config.lbfgs
    };
    let outcome = lbfgs::minimize(objective, x0, &params, config.tolerance, config.patience, budget);
    if outcome.state != RunState::Aborted {
        return (outcome, false);
    }

    debug!(
        reason = ?outcome.abort_reason,
        iterations = outcome.iterations,
        "Quasi-Newton run aborted; falling back to gentle relaxation."
    );
    let mut fallback = gentle::relax(
        objective,
        outcome.x.clone(),
        &config.gentle,
        config.tolerance,
        config.patience,
        budget.saturating_sub(outcome.iterations),
    );
    fallback.iterations += outcome.iterations;
    fallback.abort_reason = outcome.abort_reason;
    let mut trace = outcome.trace;
    trace.extend(fallback.trace.iter().skip(1));
    fallback.trace = trace;
    (fallback, true)
}

fn hybrid<O: Objective, R: Rng>(
    objective: &O,
    x0: DVector<f64>,
    config: &MinimizationConfig,
    budget: usize,
    rng: &mut R,
) -> (MinimizationOutcome, bool) {
    let annealed = annealing::anneal(
        objective,
        x0,
        &config.annealing,
        config,
        budget,
        Some(config.annealing.switch_temperature),
        rng,
    );
    if annealed.state == RunState::Aborted {
        return (annealed, false);
    }

    let remaining = budget.saturating_sub(annealed.iterations).max(1);
    let (mut polished, fell_back) =
        guarded_quasi_newton(objective, annealed.x.clone(), config, remaining);
    polished.iterations += annealed.iterations;
    let mut trace = annealed.trace;
    trace.extend(polished.trace.iter().skip(1));
    polished.trace = trace;
    (polished, fell_back)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::forcefield::energy::{Cutoffs, EnergyModel};
    use crate::core::forcefield::params::ForceField;
    use crate::core::limits::NumericLimits;
    use crate::core::models::builder::{BackboneBuilder, extended_conformation};
    use crate::core::models::residue::parse_sequence;
    use crate::core::models::structure::Structure;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    /// Separable quadratic bowl `Σ c_i (x_i - t_i)²`.
    pub(crate) struct Bowl {
        pub curvature: Vec<f64>,
        pub target: Vec<f64>,
    }

    impl Objective for Bowl {
        fn dimension(&self) -> usize {
            self.target.len()
        }

        fn value(&self, x: &DVector<f64>) -> f64 {
            x.iter()
                .zip(&self.curvature)
                .zip(&self.target)
                .map(|((x, c), t)| c * (x - t).powi(2))
                .sum()
        }

        fn value_and_gradient(&self, x: &DVector<f64>) -> (f64, DVector<f64>) {
            let gradient = DVector::from_iterator(
                x.len(),
                x.iter()
                    .zip(&self.curvature)
                    .zip(&self.target)
                    .map(|((x, c), t)| 2.0 * c * (x - t)),
            );
            (self.value(x), gradient)
        }
    }

    pub(crate) fn energy_model() -> EnergyModel {
        EnergyModel::new(
            Arc::new(ForceField::default()),
            Cutoffs::default(),
            NumericLimits::default(),
        )
    }

    /// An extended GAGA backbone with O(0) moved 0.6 Å from N(3).
    pub(crate) fn clashed_structure() -> Structure {
        let sequence = parse_sequence("GAGA").unwrap();
        let built = BackboneBuilder::default()
            .build(&sequence, &extended_conformation(sequence.len()))
            .unwrap();
        let mut structure = built.structure;
        let n3 = structure.atom_position(3, "N").unwrap();
        let o0 = structure.residue(0).unwrap().backbone().o.unwrap();
        structure.atom_mut(o0).unwrap().position = n3 + nalgebra::Vector3::new(0.6, 0.0, 0.0);
        structure
    }

    #[test]
    fn auto_selection_follows_size_thresholds() {
        assert_eq!(select_strategy(1), MinimizerStrategy::Hybrid);
        assert_eq!(select_strategy(24), MinimizerStrategy::Hybrid);
        assert_eq!(select_strategy(25), MinimizerStrategy::Lbfgs);
        assert_eq!(select_strategy(96), MinimizerStrategy::Lbfgs);
        assert_eq!(select_strategy(97), MinimizerStrategy::Gentle);
    }

    #[test]
    fn auto_budget_grows_sublinearly() {
        let small = auto_iteration_budget(16);
        let large = auto_iteration_budget(400);
        assert_eq!(small, 160);
        assert_eq!(large, 800);
        assert!(large < small * 25);
        assert_eq!(auto_iteration_budget(0), MIN_AUTO_ITERATIONS);
        assert_eq!(auto_iteration_budget(1_000_000), MAX_AUTO_ITERATIONS);
    }

    #[test]
    fn strategy_parses_from_cli_names() {
        assert_eq!("L-BFGS".parse::<MinimizerStrategy>(), Ok(MinimizerStrategy::Lbfgs));
        assert_eq!("hybrid".parse::<MinimizerStrategy>(), Ok(MinimizerStrategy::Hybrid));
        assert!("newton".parse::<MinimizerStrategy>().is_err());
    }

    #[test]
    fn flatten_and_unflatten_preserve_atom_order() {
        let points = vec![Point3::new(1.0, 2.0, 3.0), Point3::new(-4.0, 5.0, -6.0)];
        let flat = flatten(&points);
        assert_eq!(flat.len(), 6);
        assert_eq!(flat[3], -4.0);
        assert_eq!(unflatten(&flat), points);
    }

    #[test]
    fn energy_objective_matches_the_model() {
        let structure = clashed_structure();
        let model = energy_model();
        let prepared = model.prepare(&structure).unwrap();
        let objective = EnergyObjective::new(&prepared);
        let x = flatten(&structure.positions());
        assert_eq!(objective.dimension(), structure.atom_count() * 3);
        let expected = prepared.raw_energy(&structure.positions()).total();
        assert_eq!(objective.value(&x), expected);
        let (value, gradient) = objective.value_and_gradient(&x);
        assert!((value - expected).abs() <= 1e-9 * expected.abs().max(1.0));
        assert_eq!(gradient.len(), x.len());
    }

    #[test]
    fn every_strategy_lowers_the_energy_of_a_clash() {
        let structure = clashed_structure();
        let model = energy_model();
        let prepared = model.prepare(&structure).unwrap();
        let objective = EnergyObjective::new(&prepared);
        let config = MinimizationConfig::default();

        for strategy in [
            MinimizerStrategy::Gentle,
            MinimizerStrategy::Lbfgs,
            MinimizerStrategy::Annealing,
            MinimizerStrategy::Hybrid,
        ] {
            let mut rng = ChaCha8Rng::seed_from_u64(5);
            let x0 = flatten(&structure.positions());
            let report = minimize(&objective, x0, strategy, &config, 200, &mut rng);
            let outcome = &report.outcome;
            assert_ne!(outcome.state, RunState::Initialized, "{strategy}");
            assert!(outcome.final_energy().is_finite(), "{strategy}");
            assert!(
                outcome.final_energy() < outcome.initial_energy(),
                "{strategy}: {} !< {}",
                outcome.final_energy(),
                outcome.initial_energy()
            );
            let at_x = objective.value(&outcome.x);
            assert!(
                (at_x - outcome.final_energy()).abs() <= 1e-9 * at_x.abs().max(1.0),
                "{strategy}"
            );
        }
    }

    #[test]
    fn unguarded_quasi_newton_diverges_where_gentle_relaxation_does_not() {
        let structure = clashed_structure();
        let model = energy_model();
        let prepared = model.prepare(&structure).unwrap();
        let objective = EnergyObjective::new(&prepared);
        let x0 = flatten(&structure.positions());
        let config = MinimizationConfig::default();

        let gentle = gentle::relax(
            &objective,
            x0.clone(),
            &config.gentle,
            config.tolerance,
            config.patience,
            50,
        );
        assert!(gentle.initial_energy() > 0.0);
        assert!(gentle.trace.windows(2).all(|w| w[1] <= w[0]));

        let unguarded = LbfgsParams {
            guarded: false,
            ..config.lbfgs
        };
        let wild = lbfgs::minimize(&objective, x0, &unguarded, config.tolerance, config.patience, 20);
        let initial = wild.initial_energy();
        assert!(
            wild.trace
                .iter()
                .skip(1)
                .any(|e| !e.is_finite() || *e > initial + config.lbfgs.divergence_threshold)
        );
    }

    #[test]
    fn quasi_newton_abort_falls_back_to_gentle_relaxation() {
        let bowl = Bowl {
            curvature: vec![1.0; 3],
            target: vec![0.0; 3],
        };
        let config = MinimizationConfig {
            lbfgs: LbfgsParams {
                max_halvings: 0,
                max_displacement: 1e9,
                ..LbfgsParams::default()
            },
            ..MinimizationConfig::default()
        };
        // A unit step along the steepest-descent direction of a bowl with curvature 1
        // overshoots to the mirror point, which fails sufficient decrease.
        let x0 = DVector::from_vec(vec![3.0, 0.0, 0.0]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report = minimize(&bowl, x0, MinimizerStrategy::Lbfgs, &config, 50, &mut rng);
        assert!(report.fell_back);
        assert_eq!(report.outcome.abort_reason, Some(AbortReason::LineSearchFailed));
        assert!(report.outcome.final_energy() < report.outcome.initial_energy());
        assert!(report.outcome.trace.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn gentle_strategy_honors_the_iteration_budget() {
        let structure = clashed_structure();
        let model = energy_model();
        let prepared = model.prepare(&structure).unwrap();
        let objective = EnergyObjective::new(&prepared);
        let config = MinimizationConfig {
            tolerance: 1e-9,
            ..MinimizationConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let report = minimize(
            &objective,
            flatten(&structure.positions()),
            MinimizerStrategy::Gentle,
            &config,
            3,
            &mut rng,
        );
        assert!(report.outcome.iterations <= 3);
        assert!(report.outcome.trace.len() <= 4);
    }

    #[test]
    fn gentle_fallback_stays_within_the_remaining_budget() {
        let bowl = Bowl {
            curvature: vec![1.0; 3],
            target: vec![0.0; 3],
        };
        let config = MinimizationConfig {
            tolerance: 1e-12,
            lbfgs: LbfgsParams {
                max_halvings: 0,
                max_displacement: 1e9,
                ..LbfgsParams::default()
            },
            ..MinimizationConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report = minimize(
            &bowl,
            DVector::from_vec(vec![3.0, 0.0, 0.0]),
            MinimizerStrategy::Lbfgs,
            &config,
            4,
            &mut rng,
        );
        assert!(report.fell_back);
        assert!(report.outcome.iterations <= 4);
    }

    #[test]
    fn effective_budget_caps_gentle_relaxation_only() {
        let config = MinimizationConfig {
            max_iterations: Some(200),
            ..MinimizationConfig::default()
        };
        assert_eq!(config.effective_budget(MinimizerStrategy::Gentle, 10), 50);
        assert_eq!(config.effective_budget(MinimizerStrategy::Lbfgs, 10), 200);
        assert_eq!(config.effective_budget(MinimizerStrategy::Hybrid, 10), 200);
    }
}
