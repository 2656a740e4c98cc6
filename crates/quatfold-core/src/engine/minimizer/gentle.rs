//! Bounded-step steepest descent for clash removal.

use super::convergence::{ConvergenceStatus, ConvergenceTracker};
use super::{AbortReason, MinimizationOutcome, Objective, RunState, all_finite, max_block_norm};
use nalgebra::DVector;

const MIN_STEP: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GentleParams {
    /// Maximum displacement of any atom per step, in Å.
    pub max_step: f64,
    pub max_steps: usize,
    /// Stop once an accepted step lowers the energy by less than this, in kcal/mol.
    pub tolerance: f64,
}

impl Default for GentleParams {
    fn default() -> Self {
        Self {
            max_step: 0.01,
            max_steps: 50,
            tolerance: 0.1,
        }
    }
}

/// Steepest descent in which no atom moves further than `max_step` per step.
///
/// A step that would raise the energy is rejected and the step length halved, so the
/// energy trace never increases. The run is bounded by the smaller of `budget` and
/// `params.max_steps` and also ends under the shared convergence rule.
pub fn relax<O: Objective>(
    objective: &O,
    x0: DVector<f64>,
    params: &GentleParams,
    tolerance: f64,
    patience: usize,
    budget: usize,
) -> MinimizationOutcome {
    let (mut energy, mut gradient) = objective.value_and_gradient(&x0);
    if !energy.is_finite() || !all_finite(&gradient) {
        return MinimizationOutcome::aborted(x0, energy, AbortReason::NonFinite);
    }

    let budget = budget.min(params.max_steps);
    let mut tracker = ConvergenceTracker::new(tolerance, patience, budget).start(energy);
    let mut status = if budget == 0 {
        ConvergenceStatus::BudgetExhausted
    } else {
        ConvergenceStatus::Continue
    };
    let mut x = x0;
    let mut trace = vec![energy];
    let mut step = params.max_step;

    while !status.is_done() {
        let largest = max_block_norm(&gradient);
        if largest <= f64::EPSILON {
            break;
        }

        let trial = &x - &gradient * (step / largest);
        let (trial_energy, trial_gradient) = objective.value_and_gradient(&trial);
        if !trial_energy.is_finite() || trial_energy > energy || !all_finite(&trial_gradient) {
            status = tracker.record(energy);
            step *= 0.5;
            if step < MIN_STEP {
                break;
            }
            continue;
        }

        let decrease = energy - trial_energy;
        x = trial;
        energy = trial_energy;
        gradient = trial_gradient;
        trace.push(energy);
        status = tracker.record(energy);
        if decrease < params.tolerance {
            break;
        }
        step = (step * 2.0).min(params.max_step);
    }

    MinimizationOutcome {
        x,
        state: RunState::Converged,
        iterations: tracker.iterations(),
        trace,
        abort_reason: None,
    }
}
