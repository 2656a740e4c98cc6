//! Simulated annealing on Cartesian coordinates.

use super::convergence::ConvergenceTracker;
use super::{AbortReason, COORDS_PER_ATOM, MinimizationConfig, MinimizationOutcome, Objective, RunState};
use crate::engine::utils::sampling::metropolis_accept;
use nalgebra::DVector;
use rand::Rng;
use rand_distr::StandardNormal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealingParams {
    /// Starting temperature as kT, in kcal/mol.
    pub initial_temperature: f64,
    /// Geometric cooling factor applied after every move.
    pub cooling_rate: f64,
    /// Annealing stops once kT falls below this.
    pub final_temperature: f64,
    /// Hybrid runs hand over to quasi-Newton polish below this kT.
    pub switch_temperature: f64,
    /// Standard deviation of the per-coordinate Gaussian displacement, in Å.
    pub perturbation: f64,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        Self {
            initial_temperature: 2.0,
            cooling_rate: 0.95,
            final_temperature: 0.01,
            switch_temperature: 0.2,
            perturbation: 0.05,
        }
    }
}

/// Metropolis annealing of one randomly chosen atom per move.
///
/// The trace records the best energy seen after every move and the returned coordinates
/// are the best visited. With `stop_below` set, the run ends as soon as the temperature
/// drops below it.
pub fn anneal<O: Objective, R: Rng>(
    objective: &O,
    x0: DVector<f64>,
    params: &AnnealingParams,
    shared: &MinimizationConfig,
    budget: usize,
    stop_below: Option<f64>,
    rng: &mut R,
) -> MinimizationOutcome {
    let energy = objective.value(&x0);
    let atom_count = x0.len() / COORDS_PER_ATOM;
    if !energy.is_finite() {
        return MinimizationOutcome::aborted(x0, energy, AbortReason::NonFinite);
    }
    if atom_count == 0 {
        return MinimizationOutcome {
            x: x0,
            state: RunState::Converged,
            iterations: 0,
            trace: vec![energy],
            abort_reason: None,
        };
    }

    let floor = stop_below.unwrap_or(params.final_temperature);
    let mut tracker = ConvergenceTracker::new(shared.tolerance, shared.patience, budget.max(1)).start(energy);
    let mut current = x0.clone();
    let mut current_energy = energy;
    let mut best = x0;
    let mut best_energy = energy;
    let mut trace = vec![energy];
    let mut temperature = params.initial_temperature;

    while temperature >= floor {
        let atom = rng.gen_range(0..atom_count);
        let mut trial = current.clone();
        for k in 0..COORDS_PER_ATOM {
            let noise: f64 = rng.sample(StandardNormal);
            trial[atom * COORDS_PER_ATOM + k] += params.perturbation * noise;
        }

        let trial_energy = objective.value(&trial);
        if trial_energy.is_finite()
            && metropolis_accept(trial_energy - current_energy, temperature, rng)
        {
            current = trial;
            current_energy = trial_energy;
            if current_energy < best_energy {
                best = current.clone();
                best_energy = current_energy;
            }
        }
        trace.push(best_energy);
        temperature *= params.cooling_rate;

        if tracker.record(best_energy).is_done() {
            break;
        }
    }

    MinimizationOutcome {
        x: best,
        state: RunState::Converged,
        iterations: tracker.iterations(),
        trace,
        abort_reason: None,
    }
}
