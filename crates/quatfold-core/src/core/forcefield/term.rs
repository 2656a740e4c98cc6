use crate::core::limits::NumericLimits;
use serde::Serialize;
use std::ops::{Add, AddAssign};

/// Raw, uncapped energy components in kcal/mol.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EnergyTerm {
    pub bond: f64,
    pub angle: f64,
    pub dihedral: f64,
    pub vdw: f64,
    pub electrostatic: f64,
    pub restraint: f64,
}

impl EnergyTerm {
    #[inline]
    pub fn total(&self) -> f64 {
        self.bond + self.angle + self.dihedral + self.vdw + self.electrostatic + self.restraint
    }

    fn components(&self) -> [f64; 6] {
        [
            self.bond,
            self.angle,
            self.dihedral,
            self.vdw,
            self.electrostatic,
            self.restraint,
        ]
    }
}

impl Add for EnergyTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bond: self.bond + rhs.bond,
            angle: self.angle + rhs.angle,
            dihedral: self.dihedral + rhs.dihedral,
            vdw: self.vdw + rhs.vdw,
            electrostatic: self.electrostatic + rhs.electrostatic,
            restraint: self.restraint + rhs.restraint,
        }
    }
}

impl AddAssign for EnergyTerm {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Capped energy components plus the audit trail of the capping.
///
/// Every component and `total` lie within `±energy_cap` and are finite. `raw_total` is the
/// uncapped sum of the raw components, kept for audit output; it is `+∞` or NaN only when
/// `non_finite` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyBreakdown {
    pub bond: f64,
    pub angle: f64,
    pub dihedral: f64,
    pub vdw: f64,
    pub electrostatic: f64,
    pub restraint: f64,
    pub total: f64,
    pub raw_total: f64,
    /// Some component or the total hit the cap.
    pub capped: bool,
    /// Some raw value was NaN or infinite and was replaced by the cap.
    pub non_finite: bool,
}

impl EnergyBreakdown {
    /// Caps each raw component and the total.
    pub fn from_raw(raw: EnergyTerm, limits: &NumericLimits) -> Self {
        let non_finite = raw.components().iter().any(|v| !v.is_finite());
        let raw_total = raw.total();

        let mut capped = false;
        let mut clamp = |value: f64| {
            let (value, hit) = limits.clamp_energy(value);
            capped |= hit;
            value
        };
        let bond = clamp(raw.bond);
        let angle = clamp(raw.angle);
        let dihedral = clamp(raw.dihedral);
        let vdw = clamp(raw.vdw);
        let electrostatic = clamp(raw.electrostatic);
        let restraint = clamp(raw.restraint);
        let total = if non_finite {
            limits.energy_cap
        } else {
            clamp(raw_total)
        };
        capped |= non_finite;

        Self {
            bond,
            angle,
            dihedral,
            vdw,
            electrostatic,
            restraint,
            total,
            raw_total,
            capped,
            non_finite,
        }
    }

    /// The result substituted for a structure that could not be evaluated.
    pub fn sentinel(limits: &NumericLimits) -> Self {
        Self {
            bond: 0.0,
            angle: 0.0,
            dihedral: 0.0,
            vdw: 0.0,
            electrostatic: 0.0,
            restraint: 0.0,
            total: limits.energy_cap,
            raw_total: f64::INFINITY,
            capped: true,
            non_finite: true,
        }
    }

    pub fn bonded(&self) -> f64 {
        self.bond + self.angle + self.dihedral
    }

    pub fn non_bonded(&self) -> f64 {
        self.vdw + self.electrostatic
    }
}
