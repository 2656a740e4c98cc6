/// Outcome of recording one energy in a [`ConvergenceTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    Continue,
    /// The energy stayed within tolerance for `patience` consecutive steps.
    Converged,
    BudgetExhausted,
}

impl ConvergenceStatus {
    pub fn is_done(&self) -> bool {
        !matches!(self, ConvergenceStatus::Continue)
    }
}

/// The stopping rule shared by every minimizer.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    tolerance: f64,
    patience: usize,
    budget: usize,
    iterations: usize,
    stable_steps: usize,
    last_energy: Option<f64>,
}

impl ConvergenceTracker {
    pub fn new(tolerance: f64, patience: usize, budget: usize) -> Self {
        Self {
            tolerance,
            patience: patience.max(1),
            budget,
            iterations: 0,
            stable_steps: 0,
            last_energy: None,
        }
    }

    /// Seeds the tracker with the starting energy without consuming budget.
    pub fn start(mut self, energy: f64) -> Self {
        self.last_energy = Some(energy);
        self
    }

    pub fn record(&mut self, energy: f64) -> ConvergenceStatus {
        self.iterations += 1;
        if let Some(last) = self.last_energy {
            if (energy - last).abs() < self.tolerance {
                self.stable_steps += 1;
            } else {
                self.stable_steps = 0;
            }
        }
        self.last_energy = Some(energy);

        if self.stable_steps >= self.patience {
            ConvergenceStatus::Converged
        } else if self.iterations >= self.budget {
            ConvergenceStatus::BudgetExhausted
        } else {
            ConvergenceStatus::Continue
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.iterations)
    }
}
