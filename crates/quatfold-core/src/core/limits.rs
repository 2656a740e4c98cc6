//! Numeric safeguards shared across the energy model, validator, samplers and minimizers.
//!
//! These are the only definitions of the energy cap and the clash thresholds. Components
//! receive them through [`NumericLimits`] rather than re-deriving their own values.

use serde::Deserialize;

/// Symmetric bound applied to every energy accumulation, in kcal/mol.
///
/// This is a numerical-stability safeguard for near-zero-distance contacts. A value at the
/// cap is not a physical energy; [`crate::core::forcefield::term::EnergyBreakdown`] keeps
/// the uncapped value and a `capped` flag next to it.
pub const ENERGY_CAP_KCAL_MOL: f64 = 10_000.0;

/// Non-bonded atom pairs closer than this are severe clashes, in Angstroms.
pub const SEVERE_CLASH_DISTANCE: f64 = 2.0;

/// Pairs closer than this are treated as coincident by the potentials.
pub const COINCIDENT_DISTANCE: f64 = 1e-6;

/// Accepted N-CA and CA-C bond lengths, in Angstroms.
pub const INTRA_RESIDUE_BOND_RANGE: (f64, f64) = (1.0, 2.0);

/// Accepted C(i)-N(i+1) peptide bond lengths, in Angstroms.
pub const PEPTIDE_BOND_RANGE: (f64, f64) = (0.8, 2.0);

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct NumericLimits {
    pub energy_cap: f64,
    pub severe_clash_distance: f64,
}

impl Default for NumericLimits {
    fn default() -> Self {
        Self {
            energy_cap: ENERGY_CAP_KCAL_MOL,
            severe_clash_distance: SEVERE_CLASH_DISTANCE,
        }
    }
}

impl NumericLimits {
    /// Clamps `value` into `[-energy_cap, energy_cap]`, mapping NaN to the positive cap.
    ///
    /// Returns the clamped value and whether it differed from the input.
    #[inline]
    pub fn clamp_energy(&self, value: f64) -> (f64, bool) {
        if value.is_nan() {
            return (self.energy_cap, true);
        }
        let clamped = value.clamp(-self.energy_cap, self.energy_cap);
        (clamped, clamped != value)
    }
}
