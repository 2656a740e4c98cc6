use crate::core::limits::COINCIDENT_DISTANCE;

const COULOMB_CONSTANT: f64 = 332.0637; // In kcal·Å/(mol·e²)

/// Energy returned for coincident atoms; the energy model caps it.
const COINCIDENT_ENERGY: f64 = 1e10;

#[inline]
pub fn harmonic(value: f64, equilibrium: f64, k: f64) -> f64 {
    let delta = value - equilibrium;
    k * delta * delta
}

#[inline]
pub fn harmonic_derivative(value: f64, equilibrium: f64, k: f64) -> f64 {
    2.0 * k * (value - equilibrium)
}

/// `(V/2)(1 + cos(nφ - γ))`, with `phase` in radians.
#[inline]
pub fn periodic_torsion(phi: f64, barrier: f64, periodicity: f64, phase: f64) -> f64 {
    0.5 * barrier * (1.0 + (periodicity * phi - phase).cos())
}

#[inline]
pub fn periodic_torsion_derivative(phi: f64, barrier: f64, periodicity: f64, phase: f64) -> f64 {
    -0.5 * barrier * periodicity * (periodicity * phi - phase).sin()
}

#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < COINCIDENT_DISTANCE {
        return COINCIDENT_ENERGY;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    well_depth * (rho12 - 2.0 * rho6)
}

/// dE/dr of [`lennard_jones_12_6`]; zero for coincident atoms, which have no defined direction.
#[inline]
pub fn lennard_jones_12_6_derivative(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < COINCIDENT_DISTANCE {
        return 0.0;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    12.0 * well_depth * (rho6 - rho12) / dist
}

/// Coulomb energy with the distance-dependent dielectric `ε(r) = slope · r`.
#[inline]
pub fn screened_coulomb(dist: f64, q1: f64, q2: f64, dielectric_slope: f64) -> f64 {
    if dist < COINCIDENT_DISTANCE {
        return q1.signum() * q2.signum() * COINCIDENT_ENERGY;
    }
    COULOMB_CONSTANT * q1 * q2 / (dielectric_slope * dist * dist)
}

#[inline]
pub fn screened_coulomb_derivative(dist: f64, q1: f64, q2: f64, dielectric_slope: f64) -> f64 {
    if dist < COINCIDENT_DISTANCE {
        return 0.0;
    }
    -2.0 * screened_coulomb(dist, q1, q2, dielectric_slope) / dist
}

/// Zero up to `upper`, harmonic beyond it.
#[inline]
pub fn flat_bottom_upper(dist: f64, upper: f64, k: f64) -> f64 {
    if dist <= upper {
        0.0
    } else {
        harmonic(dist, upper, k)
    }
}

#[inline]
pub fn flat_bottom_upper_derivative(dist: f64, upper: f64, k: f64) -> f64 {
    if dist <= upper {
        0.0
    } else {
        harmonic_derivative(dist, upper, k)
    }
}
