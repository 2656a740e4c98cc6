//! Limited-memory BFGS with a step-halving Armijo line search.

use super::convergence::ConvergenceTracker;
use super::{AbortReason, MinimizationOutcome, Objective, RunState, all_finite, max_block_norm};
use nalgebra::DVector;
use std::collections::VecDeque;

const CURVATURE_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LbfgsParams {
    /// Number of stored curvature pairs.
    pub memory: usize,
    /// Sufficient-decrease constant of the Armijo condition.
    pub armijo: f64,
    pub max_halvings: usize,
    /// Largest per-atom displacement tried at the start of a line search, in Å.
    pub max_displacement: f64,
    /// Growth above the starting energy, in kcal/mol, treated as divergence.
    pub divergence_threshold: f64,
    pub gradient_tolerance: f64,
    /// With `false` the run takes full quasi-Newton steps with no line search and no
    /// divergence check.
    pub guarded: bool,
}

impl Default for LbfgsParams {
    fn default() -> Self {
        Self {
            memory: 7,
            armijo: 1e-4,
            max_halvings: 60,
            max_displacement: 0.3,
            divergence_threshold: 1_000.0,
            gradient_tolerance: 1e-3,
            guarded: true,
        }
    }
}

#[derive(Debug, Clone)]
struct CurvaturePair {
    s: DVector<f64>,
    y: DVector<f64>,
    rho: f64,
}

/// Two-loop recursion: returns the approximate inverse Hessian applied to `gradient`.
fn two_loop(gradient: &DVector<f64>, history: &VecDeque<CurvaturePair>) -> DVector<f64> {
    let mut q = gradient.clone();
    let mut alphas = Vec::with_capacity(history.len());
    for pair in history.iter().rev() {
        let alpha = pair.rho * pair.s.dot(&q);
        q -= &pair.y * alpha;
        alphas.push(alpha);
    }

    let gamma = history
        .back()
        .map(|p| p.s.dot(&p.y) / p.y.dot(&p.y))
        .unwrap_or(1.0);
    let mut r = q * gamma;

    for (pair, alpha) in history.iter().zip(alphas.iter().rev()) {
        let beta = pair.rho * pair.y.dot(&r);
        r += &pair.s * (alpha - beta);
    }
    r
}

struct Step {
    x: DVector<f64>,
    energy: f64,
    gradient: DVector<f64>,
}

fn line_search<O: Objective>(
    objective: &O,
    x: &DVector<f64>,
    energy: f64,
    gradient: &DVector<f64>,
    direction: &DVector<f64>,
    params: &LbfgsParams,
) -> Option<Step> {
    let largest = max_block_norm(direction);
    let mut alpha = if largest > params.max_displacement {
        params.max_displacement / largest
    } else {
        1.0
    };
    let slope = gradient.dot(direction);

    for _ in 0..=params.max_halvings {
        let trial = x + direction * alpha;
        let (trial_energy, trial_gradient) = objective.value_and_gradient(&trial);
        if trial_energy.is_finite()
            && all_finite(&trial_gradient)
            && trial_energy <= energy + params.armijo * alpha * slope
        {
            return Some(Step {
                x: trial,
                energy: trial_energy,
                gradient: trial_gradient,
            });
        }
        alpha *= 0.5;
    }
    None
}

pub fn minimize<O: Objective>(
    objective: &O,
    x0: DVector<f64>,
    params: &LbfgsParams,
    tolerance: f64,
    patience: usize,
    budget: usize,
) -> MinimizationOutcome {
    let (mut energy, mut gradient) = objective.value_and_gradient(&x0);
    if !energy.is_finite() || !all_finite(&gradient) {
        return MinimizationOutcome::aborted(x0, energy, AbortReason::NonFinite);
    }

    let initial_energy = energy;
    let mut x = x0;
    let mut trace = vec![energy];
    let mut history: VecDeque<CurvaturePair> = VecDeque::with_capacity(params.memory);
    let mut tracker = ConvergenceTracker::new(tolerance, patience, budget.max(1)).start(energy);
    let mut abort_reason = None;

    let state = loop {
        if gradient.norm() < params.gradient_tolerance {
            break RunState::Converged;
        }

        let mut direction = -two_loop(&gradient, &history);
        if direction.dot(&gradient) >= 0.0 {
            history.clear();
            direction = -gradient.clone();
        }

        let step = if params.guarded {
            match line_search(objective, &x, energy, &gradient, &direction, params) {
                Some(step) => step,
                None if !history.is_empty() => {
                    history.clear();
                    if tracker.record(energy).is_done() {
                        break RunState::Converged;
                    }
                    continue;
                }
                None => {
                    abort_reason = Some(AbortReason::LineSearchFailed);
                    break RunState::Aborted;
                }
            }
        } else {
            let trial = &x + &direction;
            let (trial_energy, trial_gradient) = objective.value_and_gradient(&trial);
            Step {
                x: trial,
                energy: trial_energy,
                gradient: trial_gradient,
            }
        };

        if !step.energy.is_finite() || !all_finite(&step.gradient) {
            trace.push(step.energy);
            x = step.x;
            abort_reason = Some(AbortReason::NonFinite);
            break RunState::Aborted;
        }
        if params.guarded && step.energy > initial_energy + params.divergence_threshold {
            abort_reason = Some(AbortReason::Diverged);
            break RunState::Aborted;
        }

        let s = &step.x - &x;
        let y = &step.gradient - &gradient;
        let sy = s.dot(&y);
        if sy > CURVATURE_EPSILON {
            if history.len() == params.memory.max(1) {
                history.pop_front();
            }
            history.push_back(CurvaturePair { s, y, rho: 1.0 / sy });
        }

        x = step.x;
        energy = step.energy;
        gradient = step.gradient;
        trace.push(energy);

        if tracker.record(energy).is_done() {
            break RunState::Converged;
        }
    };

    MinimizationOutcome {
        x,
        state,
        iterations: tracker.iterations(),
        trace,
        abort_reason,
    }
}
