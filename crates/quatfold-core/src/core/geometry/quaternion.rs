use nalgebra::{Quaternion, UnitQuaternion};
use std::f64::consts::{PI, SQRT_2};

/// Above this dot product two quaternions are treated as coincident and slerp falls back
/// to normalized linear interpolation.
pub const SLERP_LINEAR_THRESHOLD: f64 = 0.9995;

/// Second irrational of the super-Fibonacci spiral (root of x^4 = x + 4).
const SUPER_FIBONACCI_PSI: f64 = 1.533_751_168_755_204_3;

/// Projects an arbitrary quaternion back onto the unit hypersphere.
///
/// Degenerate input (zero or non-finite norm) maps to the identity.
pub fn renormalize(q: &Quaternion<f64>) -> UnitQuaternion<f64> {
    let norm = q.norm();
    if !norm.is_finite() || norm < f64::EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::new_unchecked(*q / norm)
}

/// Shortest-arc spherical linear interpolation between two unit quaternions.
///
/// `t` is clamped to `[0, 1]`. When the operands lie in opposite hemispheres `q2` is
/// negated so the interpolation follows the shorter great-circle arc; the endpoint at
/// `t = 1` is then `-q2`, which represents the same rotation. Nearly coincident operands
/// (dot product above [`SLERP_LINEAR_THRESHOLD`]) are interpolated linearly and
/// renormalized to avoid dividing by a vanishing sine.
pub fn slerp(q1: &UnitQuaternion<f64>, q2: &UnitQuaternion<f64>, t: f64) -> UnitQuaternion<f64> {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let a = *q1.quaternion();
    let mut b = *q2.quaternion();

    let mut dot = a.dot(&b);
    if dot < 0.0 {
        b = -b;
        dot = -dot;
    }

    if dot > SLERP_LINEAR_THRESHOLD {
        return renormalize(&(a * (1.0 - t) + b * t));
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let sin_theta_0 = theta_0.sin();
    let theta = theta_0 * t;
    let s1 = (theta_0 - theta).sin() / sin_theta_0;
    let s2 = theta.sin() / sin_theta_0;

    renormalize(&(a * s1 + b * s2))
}

/// Angular separation measure in `[0, 1]`: 0 for identical rotations, 1 for orthogonal ones.
pub fn quaternion_distance(q1: &UnitQuaternion<f64>, q2: &UnitQuaternion<f64>) -> f64 {
    1.0 - q1.quaternion().dot(q2.quaternion()).abs().min(1.0)
}

/// Generates `count` well-distributed unit quaternions using a super-Fibonacci spiral.
///
/// The sequence is deterministic and low-discrepancy, so consecutive prefixes cover the
/// hypersphere without clustering.
pub fn super_fibonacci_points(count: usize) -> Vec<UnitQuaternion<f64>> {
    if count == 0 {
        return Vec::new();
    }
    let n = count as f64;
    (0..count)
        .map(|i| {
            let s = i as f64 + 0.5;
            let fraction = s / n;
            let r = fraction.sqrt();
            let big_r = (1.0 - fraction).sqrt();
            let alpha = 2.0 * PI * s / SQRT_2;
            let beta = 2.0 * PI * s / SUPER_FIBONACCI_PSI;
            renormalize(&Quaternion::new(
                r * alpha.sin(),
                r * alpha.cos(),
                big_r * beta.sin(),
                big_r * beta.cos(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn unit(w: f64, i: f64, j: f64, k: f64) -> UnitQuaternion<f64> {
        renormalize(&Quaternion::new(w, i, j, k))
    }

    fn assert_quaternion_eq(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) {
        assert!(
            (a.quaternion() - b.quaternion()).norm() < TOLERANCE,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn renormalize_returns_unit_norm() {
        let q = renormalize(&Quaternion::new(2.0, -1.0, 0.5, 3.0));
        assert!((q.quaternion().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn renormalize_maps_degenerate_input_to_identity() {
        assert_eq!(
            renormalize(&Quaternion::new(0.0, 0.0, 0.0, 0.0)),
            UnitQuaternion::identity()
        );
        assert_eq!(
            renormalize(&Quaternion::new(f64::NAN, 0.0, 0.0, 0.0)),
            UnitQuaternion::identity()
        );
    }

    #[test]
    fn slerp_endpoints_match_operands() {
        let q1 = unit(0.9, 0.1, 0.3, 0.2);
        let q2 = unit(0.2, 0.7, 0.1, 0.6);
        assert!(q1.quaternion().dot(q2.quaternion()) > 0.0);
        assert_quaternion_eq(&slerp(&q1, &q2, 0.0), &q1);
        assert_quaternion_eq(&slerp(&q1, &q2, 1.0), &q2);
    }

    #[test]
    fn slerp_output_is_unit_norm_for_any_t() {
        let q1 = unit(0.5, -0.5, 0.5, 0.5);
        let q2 = unit(-0.1, 0.8, 0.3, -0.5);
        for step in 0..=20 {
            let t = step as f64 / 20.0;
            let q = slerp(&q1, &q2, t);
            assert!((q.quaternion().norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn slerp_takes_the_shorter_arc_for_opposite_hemispheres() {
        let q1 = unit(1.0, 0.2, 0.0, 0.0);
        let q2 = unit(-1.0, -0.1, 0.05, 0.0);
        let end = slerp(&q1, &q2, 1.0);
        assert_quaternion_eq(&end, &UnitQuaternion::new_unchecked(-*q2.quaternion()));
        let mid = slerp(&q1, &q2, 0.5);
        assert!(mid.quaternion().dot(q1.quaternion()) > 0.9);
    }

    #[test]
    fn slerp_nearly_coincident_operands_uses_linear_fallback() {
        let q1 = unit(1.0, 1e-5, 0.0, 0.0);
        let q2 = unit(1.0, 2e-5, 0.0, 0.0);
        let mid = slerp(&q1, &q2, 0.5);
        assert!((mid.quaternion().norm() - 1.0).abs() < 1e-12);
        assert!(mid.quaternion().i > q1.quaternion().i);
        assert!(mid.quaternion().i < q2.quaternion().i);
    }

    #[test]
    fn slerp_midpoint_is_equidistant() {
        let q1 = unit(1.0, 0.0, 0.0, 0.0);
        let q2 = unit(0.0, 1.0, 0.0, 0.0);
        let mid = slerp(&q1, &q2, 0.5);
        let d1 = quaternion_distance(&mid, &q1);
        let d2 = quaternion_distance(&mid, &q2);
        assert!((d1 - d2).abs() < 1e-12);
    }

    #[test]
    fn super_fibonacci_points_are_unit_and_distinct() {
        let points = super_fibonacci_points(64);
        assert_eq!(points.len(), 64);
        for p in &points {
            assert!((p.quaternion().norm() - 1.0).abs() < 1e-12);
        }
        for (a, b) in points.iter().zip(points.iter().skip(1)) {
            assert!(quaternion_distance(a, b) > 1e-6);
        }
    }

    #[test]
    fn super_fibonacci_points_are_deterministic() {
        assert_eq!(super_fibonacci_points(16), super_fibonacci_points(16));
        assert!(super_fibonacci_points(0).is_empty());
    }
}
