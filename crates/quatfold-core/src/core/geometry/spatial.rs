use nalgebra::{Matrix3, Point3, Unit, UnitQuaternion, Vector3};

/// Tetrahedral half-angle used to place an sp3 substituent off the bisector plane.
const TETRAHEDRAL_HALF_ANGLE_DEGREES: f64 = 54.75;

/// Places atom `D` from three preceding atoms `A`, `B`, `C` using internal coordinates.
///
/// `bond_length` is |CD|, `bond_angle` the angle B-C-D and `torsion` the dihedral A-B-C-D,
/// both in radians. The direction of the new bond is obtained by rotating the unit vector
/// B→C with two quaternions: a bend about the normal of the A-B-C plane by `π - bond_angle`,
/// then a twist about B→C by `torsion`. Collinear reference atoms fall back to an arbitrary
/// perpendicular bend axis.
pub fn place_atom(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    bond_length: f64,
    bond_angle: f64,
    torsion: f64,
) -> Point3<f64> {
    let bc = Unit::new_normalize(c - b);
    let normal = (b - a).cross(&bc);
    let bend_axis = if normal.norm() > 1e-10 {
        Unit::new_normalize(normal)
    } else {
        Unit::new_normalize(any_perpendicular(&bc))
    };

    let bend = UnitQuaternion::from_axis_angle(&bend_axis, std::f64::consts::PI - bond_angle);
    let twist = UnitQuaternion::from_axis_angle(&bc, torsion);
    let direction = twist * (bend * bc.into_inner());

    c + direction * bond_length
}

/// Angle A-B-C in radians.
pub fn bond_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    (a - b).angle(&(c - b))
}

/// Dihedral angle A-B-C-D in radians, IUPAC sign convention, in `(-π, π]`.
pub fn dihedral_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;

    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);

    let y = b2.norm() * b1.dot(&n2);
    let x = n1.dot(&n2);
    y.atan2(x)
}

pub fn calculate_hn_position(
    n_pos: &Point3<f64>,
    ca_pos: &Point3<f64>,
    prev_c_pos: &Point3<f64>,
    bond_length: f64,
) -> Point3<f64> {
    let n_ca = (ca_pos - n_pos).normalize();
    let n_c_prev = (prev_c_pos - n_pos).normalize();

    let hn_dir = -(n_ca + n_c_prev).normalize();

    n_pos + hn_dir * bond_length
}

/// Places the alpha hydrogen of a backbone-only residue in tetrahedral geometry.
///
/// The hydrogen sits off the N-CA-C bisector, on the side that gives L-chirality when a
/// CB atom would occupy the remaining tetrahedral position.
pub fn calculate_ha_position(
    n_pos: &Point3<f64>,
    ca_pos: &Point3<f64>,
    c_pos: &Point3<f64>,
    bond_length: f64,
) -> Point3<f64> {
    let u_n = (n_pos - ca_pos).normalize();
    let u_c = (c_pos - ca_pos).normalize();

    let bisector = -(u_n + u_c).normalize();
    let perpendicular = u_c.cross(&u_n).normalize();

    let half_angle = TETRAHEDRAL_HALF_ANGLE_DEGREES.to_radians();
    let direction = bisector * half_angle.cos() + perpendicular * half_angle.sin();

    ca_pos + direction.normalize() * bond_length
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// RMSD after optimal rigid superposition of `mobile` onto `reference` (Kabsch).
///
/// Returns `None` when the sets differ in length, are empty, or the SVD fails.
pub fn superposed_rmsd(reference: &[Point3<f64>], mobile: &[Point3<f64>]) -> Option<f64> {
    if reference.len() != mobile.len() || reference.is_empty() {
        return None;
    }
    let ref_center = centroid(reference);
    let mob_center = centroid(mobile);

    let mut covariance = Matrix3::zeros();
    for (p, q) in mobile.iter().zip(reference) {
        covariance += (p - mob_center) * (q - ref_center).transpose();
    }

    let svd = covariance.svd(true, true);
    let u = svd.u?;
    let v = svd.v_t?.transpose();
    let d = (v * u.transpose()).determinant().signum();
    let correction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d));
    let rotation = v * correction * u.transpose();

    let aligned: Vec<Point3<f64>> = mobile
        .iter()
        .map(|p| Point3::from(rotation * (p - mob_center)) + ref_center.coords)
        .collect();
    calculate_rmsd(reference, &aligned)
}

fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as f64)
}

fn any_perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let helper = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    v.cross(&helper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-9;

    fn reference_frame() -> (Point3<f64>, Point3<f64>, Point3<f64>) {
        (
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
        )
    }

    #[test]
    fn place_atom_honors_bond_length_angle_and_torsion() {
        let (a, b, c) = reference_frame();
        for torsion_deg in [-180.0, -120.0, -60.0, 0.0, 45.0, 90.0, 179.0] {
            let torsion = f64::to_radians(torsion_deg);
            let angle = 111.2_f64.to_radians();
            let d = place_atom(&a, &b, &c, 1.33, angle, torsion);
            assert!(((d - c).norm() - 1.33).abs() < TOLERANCE);
            assert!((bond_angle(&b, &c, &d) - angle).abs() < 1e-9);
            let measured = dihedral_angle(&a, &b, &c, &d);
            let diff = (measured - torsion + PI).rem_euclid(2.0 * PI) - PI;
            assert!(diff.abs() < 1e-9, "torsion {torsion_deg}: measured {measured}");
        }
    }

    #[test]
    fn place_atom_handles_collinear_reference_atoms() {
        let a = Point3::new(-1.0, 0.0, 0.0);
        let b = Point3::new(0.0, 0.0, 0.0);
        let c = Point3::new(1.0, 0.0, 0.0);
        let d = place_atom(&a, &b, &c, 1.0, 120.0_f64.to_radians(), 0.3);
        assert!(((d - c).norm() - 1.0).abs() < TOLERANCE);
        assert!(d.coords.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn dihedral_angle_is_positive_for_clockwise_rotation() {
        let (a, b, c) = reference_frame();
        let d = Point3::new(2.0, 0.0, 1.0);
        assert!((dihedral_angle(&a, &b, &c, &d) - PI / 2.0).abs() < TOLERANCE);
        let d_neg = Point3::new(2.0, 0.0, -1.0);
        assert!((dihedral_angle(&a, &b, &c, &d_neg) + PI / 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn calculate_hn_position_bisects_the_external_angle() {
        let n = Point3::new(0.0, 0.0, 0.0);
        let ca = Point3::new(1.0, 0.0, 0.0);
        let prev_c = Point3::new(-0.5, 0.866, 0.0);
        let h = calculate_hn_position(&n, &ca, &prev_c, 1.01);
        assert!(((h - n).norm() - 1.01).abs() < TOLERANCE);
        let angle_to_ca = bond_angle(&h, &n, &ca);
        let angle_to_c = bond_angle(&h, &n, &prev_c);
        assert!((angle_to_ca - angle_to_c).abs() < 1e-6);
    }

    #[test]
    fn calculate_ha_position_is_roughly_tetrahedral() {
        let n = Point3::new(-0.5, 1.36, 0.0);
        let ca = Point3::new(0.0, 0.0, 0.0);
        let c = Point3::new(1.52, 0.0, 0.0);
        let ha = calculate_ha_position(&n, &ca, &c, 1.09);
        assert!(((ha - ca).norm() - 1.09).abs() < TOLERANCE);
        let angle_n = bond_angle(&n, &ca, &ha).to_degrees();
        let angle_c = bond_angle(&c, &ca, &ha).to_degrees();
        assert!((angle_n - angle_c).abs() < 1e-6);
        assert!(angle_n > 100.0 && angle_n < 120.0);
    }

    #[test]
    fn calculate_rmsd_rejects_mismatched_lengths() {
        let a = vec![Point3::origin()];
        assert!(calculate_rmsd(&a, &[]).is_none());
        assert_eq!(calculate_rmsd(&a, &a), Some(0.0));
    }

    #[test]
    fn superposed_rmsd_is_invariant_to_rigid_motion() {
        let reference = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.8, 0.0, 0.0),
            Point3::new(5.0, 3.5, 0.0),
            Point3::new(4.0, 5.0, 2.5),
        ];
        let rotation = Rotation3::from_euler_angles(0.3, -1.1, 2.0);
        let shift = Vector3::new(10.0, -4.0, 7.5);
        let moved: Vec<_> = reference.iter().map(|p| rotation * p + shift).collect();

        let raw = calculate_rmsd(&reference, &moved).unwrap();
        let aligned = superposed_rmsd(&reference, &moved).unwrap();
        assert!(raw > 1.0);
        assert!(aligned < 1e-6);
    }

    #[test]
    fn superposed_rmsd_does_not_reflect_mirror_images() {
        let reference = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let mirrored: Vec<_> = reference
            .iter()
            .map(|p| Point3::new(p.x, p.y, -p.z))
            .collect();
        assert!(superposed_rmsd(&reference, &mirrored).unwrap() > 0.1);
    }
}
