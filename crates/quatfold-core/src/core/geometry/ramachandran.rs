//! The (phi, psi) ↔ unit-quaternion encoding.
//!
//! A pair of backbone dihedrals is a point on a torus. The encoding embeds that torus in
//! the unit hypersphere as the Clifford torus:
//!
//! ```text
//! q = (cos φ/2, sin φ/2, cos ψ/2, sin ψ/2) / √2        (w, i, j, k)
//! ```
//!
//! The map is smooth, has no singularities and is inverted exactly with two `atan2` calls.
//! Decoding doubles the recovered half-angles, so `q` and `-q` decode to the same pair and
//! the hemisphere flip performed by shortest-arc slerp is harmless. Every encoded pair has
//! `|w| ≤ 1/√2`, so the identity quaternion is never produced by a defined pair and can
//! serve as the sentinel for undefined terminal angles.

use super::quaternion::renormalize;
use nalgebra::{Quaternion, UnitQuaternion};
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Closeness to ±identity, in |w|, below which a quaternion decodes to undefined angles.
const IDENTITY_TOLERANCE: f64 = 1e-9;

/// Backbone dihedral angles of one residue, in radians.
///
/// `phi` is undefined (NaN) for the first residue of a chain and `psi` for the last one.
/// `omega` is the peptide-bond torsion following this residue and defaults to a trans
/// bond (π).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RamachandranAngles {
    pub phi: f64,
    pub psi: f64,
    pub omega: f64,
}

impl Default for RamachandranAngles {
    fn default() -> Self {
        Self::undefined()
    }
}

impl RamachandranAngles {
    pub fn new(phi: f64, psi: f64) -> Self {
        Self {
            phi,
            psi,
            omega: PI,
        }
    }

    pub fn with_omega(phi: f64, psi: f64, omega: f64) -> Self {
        Self { phi, psi, omega }
    }

    pub fn from_degrees(phi: f64, psi: f64) -> Self {
        Self::new(phi.to_radians(), psi.to_radians())
    }

    pub fn undefined() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }

    /// Both `phi` and `psi` are finite.
    pub fn is_defined(&self) -> bool {
        self.phi.is_finite() && self.psi.is_finite()
    }

    pub fn phi_degrees(&self) -> f64 {
        self.phi.to_degrees()
    }

    pub fn psi_degrees(&self) -> f64 {
        self.psi.to_degrees()
    }

    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        to_quaternion(self.phi, self.psi)
    }

    /// Decodes a quaternion, keeping the default trans `omega`.
    pub fn from_quaternion(q: &UnitQuaternion<f64>) -> Self {
        let (phi, psi) = from_quaternion(q);
        Self::new(phi, psi)
    }
}

/// Encodes a (phi, psi) pair as a unit quaternion on the Clifford torus.
///
/// A NaN in either angle maps to the identity quaternion `(1, 0, 0, 0)`.
pub fn to_quaternion(phi: f64, psi: f64) -> UnitQuaternion<f64> {
    if phi.is_nan() || psi.is_nan() {
        return UnitQuaternion::identity();
    }
    let (half_phi, half_psi) = (0.5 * phi, 0.5 * psi);
    let q = Quaternion::new(
        half_phi.cos() * FRAC_1_SQRT_2,
        half_phi.sin() * FRAC_1_SQRT_2,
        half_psi.cos() * FRAC_1_SQRT_2,
        half_psi.sin() * FRAC_1_SQRT_2,
    );
    renormalize(&q)
}

/// Decodes a unit quaternion into a (phi, psi) pair in `(-π, π]`.
///
/// `q` and `-q` decode to the same pair. The identity quaternion (or its antipode) decodes
/// to `(NaN, NaN)`. Quaternions off the Clifford torus, such as slerp intermediates, decode
/// to the torus point reached by radial projection within each coordinate plane; a plane with vanishing radius leaves the
/// corresponding angle undefined.
pub fn from_quaternion(q: &UnitQuaternion<f64>) -> (f64, f64) {
    let q = q.quaternion();
    if (q.w.abs() - 1.0).abs() < IDENTITY_TOLERANCE {
        return (f64::NAN, f64::NAN);
    }
    let phi_radius = q.w * q.w + q.i * q.i;
    let psi_radius = q.j * q.j + q.k * q.k;
    let phi = if phi_radius > 1e-12 {
        wrap_angle(2.0 * q.i.atan2(q.w))
    } else {
        f64::NAN
    };
    let psi = if psi_radius > 1e-12 {
        wrap_angle(2.0 * q.k.atan2(q.j))
    } else {
        f64::NAN
    };
    (phi, psi)
}

/// Wraps an angle into `(-π, π]`. NaN is preserved.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let mut wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped -= 2.0 * PI;
    }
    wrapped
}

/// Absolute shortest angular distance between two angles, in `[0, π]`.
pub fn angular_difference(a: f64, b: f64) -> f64 {
    wrap_angle(a - b).abs()
}

/// Encodes a whole angle set residue by residue.
pub fn encode_angles(angles: &[RamachandranAngles]) -> Vec<UnitQuaternion<f64>> {
    angles.iter().map(RamachandranAngles::to_quaternion).collect()
}

/// Decodes a quaternion set, re-applying the terminal conventions of a chain of that length.
pub fn decode_angles(quaternions: &[UnitQuaternion<f64>]) -> Vec<RamachandranAngles> {
    let mut angles: Vec<_> = quaternions
        .iter()
        .map(RamachandranAngles::from_quaternion)
        .collect();
    mark_termini(&mut angles);
    angles
}

/// Marks the chain-terminal angles as undefined: `phi` of the first residue and `psi` of
/// the last residue.
pub fn mark_termini(angles: &mut [RamachandranAngles]) {
    if let Some(first) = angles.first_mut() {
        first.phi = f64::NAN;
    }
    if let Some(last) = angles.last_mut() {
        last.psi = f64::NAN;
    }
}
