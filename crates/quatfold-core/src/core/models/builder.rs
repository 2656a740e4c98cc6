use super::atom::{Atom, Element};
use super::residue::AminoAcid;
use super::structure::{Structure, StructureError};
use crate::core::geometry::ramachandran::{RamachandranAngles, mark_termini};
use crate::core::geometry::spatial::{calculate_ha_position, calculate_hn_position, place_atom};
use crate::core::validation::{ValidationReport, validate};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

const EXTENDED_PHI_DEGREES: f64 = -120.0;
const EXTENDED_PSI_DEGREES: f64 = 120.0;

/// Ideal backbone bond lengths (Å) and bond angles (degrees).
///
/// Defaults are the Engh & Huber values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BackboneGeometry {
    pub n_ca: f64,
    pub ca_c: f64,
    pub c_n: f64,
    pub c_o: f64,
    pub n_h: f64,
    pub ca_ha: f64,
    pub n_ca_c: f64,
    pub ca_c_n: f64,
    pub c_n_ca: f64,
    pub ca_c_o: f64,
}

impl Default for BackboneGeometry {
    fn default() -> Self {
        Self {
            n_ca: 1.458,
            ca_c: 1.523,
            c_n: 1.329,
            c_o: 1.231,
            n_h: 1.01,
            ca_ha: 1.09,
            n_ca_c: 111.2,
            ca_c_n: 116.2,
            c_n_ca: 121.7,
            ca_c_o: 120.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Cannot build a backbone for an empty sequence")]
    EmptySequence,
    #[error("Angle count mismatch: {residues} residues but {angles} angle sets")]
    LengthMismatch { residues: usize, angles: usize },
    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// A built backbone together with its validation result.
#[derive(Debug, Clone)]
pub struct BuiltBackbone {
    pub structure: Structure,
    pub report: ValidationReport,
}

#[derive(Debug, Clone, Copy)]
struct ResidueFrame {
    n: Point3<f64>,
    ca: Point3<f64>,
    c: Point3<f64>,
    o: Point3<f64>,
}

/// Forward-kinematics construction of N, CA, C, O (and optionally H and HA) from
/// per-residue dihedrals.
///
/// The first residue is laid out in a fixed frame with N at the origin and CA on the x axis.
/// Each following atom is placed from the three atoms before it:
///
/// - N(i+1) from N(i), CA(i), C(i) with torsion psi(i)
/// - CA(i+1) from CA(i), C(i), N(i+1) with torsion omega(i)
/// - C(i+1) from C(i), N(i+1), CA(i+1) with torsion phi(i+1)
/// - O(i) from N(i), CA(i), C(i) with torsion psi(i) + 180°
///
/// Undefined interior angles fall back to the extended conformation and an undefined
/// omega to a trans peptide bond.
#[derive(Debug, Clone, Default)]
pub struct BackboneBuilder {
    geometry: BackboneGeometry,
    include_hydrogens: bool,
}

impl BackboneBuilder {
    pub fn new(geometry: BackboneGeometry) -> Self {
        Self {
            geometry,
            include_hydrogens: false,
        }
    }

    pub fn with_hydrogens(mut self, include_hydrogens: bool) -> Self {
        self.include_hydrogens = include_hydrogens;
        self
    }

    pub fn geometry(&self) -> &BackboneGeometry {
        &self.geometry
    }

    pub fn build(
        &self,
        sequence: &[AminoAcid],
        angles: &[RamachandranAngles],
    ) -> Result<BuiltBackbone, BuildError> {
        if sequence.is_empty() {
            return Err(BuildError::EmptySequence);
        }
        if sequence.len() != angles.len() {
            return Err(BuildError::LengthMismatch {
                residues: sequence.len(),
                angles: angles.len(),
            });
        }

        let frames = self.trace_frames(angles);
        let structure = self.assemble(sequence, &frames)?;
        let report = validate(&structure);
        Ok(BuiltBackbone { structure, report })
    }

    fn trace_frames(&self, angles: &[RamachandranAngles]) -> Vec<ResidueFrame> {
        let g = &self.geometry;
        let n_ca_c = g.n_ca_c.to_radians();
        let ca_c_n = g.ca_c_n.to_radians();
        let c_n_ca = g.c_n_ca.to_radians();
        let ca_c_o = g.ca_c_o.to_radians();

        let phi_of = |i: usize| or_default(angles[i].phi, EXTENDED_PHI_DEGREES.to_radians());
        let psi_of = |i: usize| or_default(angles[i].psi, EXTENDED_PSI_DEGREES.to_radians());
        let omega_of = |i: usize| or_default(angles[i].omega, PI);

        let n = Point3::origin();
        let ca = Point3::new(g.n_ca, 0.0, 0.0);
        let c = ca + nalgebra::Vector3::new(-n_ca_c.cos(), n_ca_c.sin(), 0.0) * g.ca_c;

        let mut frames = Vec::with_capacity(angles.len());
        let (mut n, mut ca, mut c) = (n, ca, c);
        for i in 0..angles.len() {
            let psi = psi_of(i);
            let o = place_atom(&n, &ca, &c, g.c_o, ca_c_o, psi + PI);
            frames.push(ResidueFrame { n, ca, c, o });

            if i + 1 < angles.len() {
                let next_n = place_atom(&n, &ca, &c, g.c_n, ca_c_n, psi);
                let next_ca = place_atom(&ca, &c, &next_n, g.n_ca, c_n_ca, omega_of(i));
                let next_c = place_atom(&c, &next_n, &next_ca, g.ca_c, n_ca_c, phi_of(i + 1));
                (n, ca, c) = (next_n, next_ca, next_c);
            }
        }
        frames
    }

    fn assemble(
        &self,
        sequence: &[AminoAcid],
        frames: &[ResidueFrame],
    ) -> Result<Structure, BuildError> {
        let mut structure = Structure::new();
        let mut previous_c: Option<Point3<f64>> = None;

        for (amino_acid, frame) in sequence.iter().zip(frames) {
            let res = structure.add_residue(amino_acid.three_letter(), 'A');
            let mut atoms = vec![
                Atom::new("N", res, frame.n),
                Atom::new("CA", res, frame.ca),
                Atom::new("C", res, frame.c),
                Atom::new("O", res, frame.o),
            ];
            if self.include_hydrogens {
                if let Some(prev_c) = previous_c.filter(|_| !amino_acid.is_proline()) {
                    let h = calculate_hn_position(&frame.n, &frame.ca, &prev_c, self.geometry.n_h);
                    atoms.push(Atom::new("H", res, h).with_element(Element::Hydrogen));
                }
                let ha = calculate_ha_position(&frame.n, &frame.ca, &frame.c, self.geometry.ca_ha);
                atoms.push(Atom::new("HA", res, ha).with_element(Element::Hydrogen));
            }
            for atom in atoms {
                structure.add_atom(res, atom)?;
            }
            previous_c = Some(frame.c);
        }
        Ok(structure)
    }
}

/// Fully extended chain (phi = -120°, psi = +120°) with undefined termini.
pub fn extended_conformation(length: usize) -> Vec<RamachandranAngles> {
    let mut angles =
        vec![RamachandranAngles::from_degrees(EXTENDED_PHI_DEGREES, EXTENDED_PSI_DEGREES); length];
    mark_termini(&mut angles);
    angles
}

#[inline]
fn or_default(value: f64, default: f64) -> f64 {
    if value.is_finite() { value } else { default }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::ramachandran::angular_difference;
    use crate::core::geometry::spatial::bond_angle;
    use crate::core::models::residue::parse_sequence;

    fn build(sequence: &str, angles: &[RamachandranAngles], hydrogens: bool) -> BuiltBackbone {
        let residues = parse_sequence(sequence).unwrap();
        BackboneBuilder::default()
            .with_hydrogens(hydrogens)
            .build(&residues, angles)
            .unwrap()
    }

    #[test]
    fn gac_extended_builds_twelve_valid_backbone_atoms() {
        let angles = vec![RamachandranAngles::from_degrees(-120.0, 120.0); 3];
        let built = build("GAC", &angles, false);

        assert_eq!(built.structure.residue_count(), 3);
        assert_eq!(built.structure.atom_count(), 12);
        assert!(built.report.valid, "{:?}", built.report.reason);

        let n = built.structure.atom_position(0, "N").unwrap();
        let ca = built.structure.atom_position(0, "CA").unwrap();
        assert!(((ca - n).norm() - 1.458).abs() < 0.5);
    }

    #[test]
    fn default_geometry_bond_lengths_hold_for_every_residue() {
        let angles: Vec<_> = (0..8)
            .map(|i| RamachandranAngles::from_degrees(-60.0 - 5.0 * i as f64, -45.0 + 20.0 * i as f64))
            .collect();
        let built = build("MKTAYIAK", &angles, false);
        for i in 0..8 {
            let s = &built.structure;
            let n = s.atom_position(i, "N").unwrap();
            let ca = s.atom_position(i, "CA").unwrap();
            let c = s.atom_position(i, "C").unwrap();
            assert!(((ca - n).norm() - 1.458).abs() < 0.01);
            assert!(((c - ca).norm() - 1.523).abs() < 0.01);
            assert!((bond_angle(&n, &ca, &c).to_degrees() - 111.2).abs() < 1e-6);
            if i + 1 < 8 {
                let next_n = s.atom_position(i + 1, "N").unwrap();
                assert!(((next_n - c).norm() - 1.329).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn built_backbone_reproduces_input_dihedrals() {
        let mut angles = vec![
            RamachandranAngles::from_degrees(-57.0, -47.0),
            RamachandranAngles::from_degrees(-139.0, 135.0),
            RamachandranAngles::from_degrees(57.0, 47.0),
            RamachandranAngles::from_degrees(-75.0, 145.0),
        ];
        mark_termini(&mut angles);
        let built = build("AGSP", &angles, false);
        let measured = built.structure.backbone_angles();

        for i in 1..4 {
            assert!(angular_difference(measured[i].phi, angles[i].phi) < 1e-6);
        }
        for i in 0..3 {
            assert!(angular_difference(measured[i].psi, angles[i].psi) < 1e-6);
            assert!(angular_difference(measured[i].omega, PI) < 1e-6);
        }
        assert!(measured[0].phi.is_nan());
        assert!(measured[3].psi.is_nan());
    }

    #[test]
    fn cis_omega_is_honored() {
        let angles = vec![
            RamachandranAngles::with_omega(f64::NAN, 2.0, 0.0),
            RamachandranAngles::new(-1.2, f64::NAN),
        ];
        let built = build("AP", &angles, false);
        let measured = built.structure.backbone_angles();
        assert!(angular_difference(measured[0].omega, 0.0) < 1e-6);
    }

    #[test]
    fn hydrogens_skip_first_residue_and_proline() {
        let angles = extended_conformation(3);
        let built = build("APG", &angles, true);
        let s = &built.structure;

        assert!(s.residue(0).unwrap().backbone().h.is_none());
        assert!(s.residue(1).unwrap().backbone().h.is_none());
        assert!(s.residue(2).unwrap().backbone().h.is_some());
        assert!(s.residues().iter().all(|r| r.backbone().ha.is_some()));
        assert_eq!(s.atom_count(), 3 * 4 + 1 + 3);
        assert!(built.report.valid);

        let n = s.atom_position(2, "N").unwrap();
        let h = s.atom_position(2, "H").unwrap();
        assert!(((h - n).norm() - 1.01).abs() < 1e-9);
    }

    #[test]
    fn build_rejects_mismatched_angle_count() {
        let residues = parse_sequence("GAC").unwrap();
        let result = BackboneBuilder::default().build(&residues, &extended_conformation(2));
        assert_eq!(
            result.unwrap_err(),
            BuildError::LengthMismatch {
                residues: 3,
                angles: 2
            }
        );
        assert_eq!(
            BackboneBuilder::default().build(&[], &[]).unwrap_err(),
            BuildError::EmptySequence
        );
    }

    #[test]
    fn geometry_table_is_swappable() {
        let geometry = BackboneGeometry {
            n_ca: 1.5,
            ..BackboneGeometry::default()
        };
        let residues = parse_sequence("GG").unwrap();
        let built = BackboneBuilder::new(geometry)
            .build(&residues, &extended_conformation(2))
            .unwrap();
        let n = built.structure.atom_position(1, "N").unwrap();
        let ca = built.structure.atom_position(1, "CA").unwrap();
        assert!(((ca - n).norm() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn geometry_deserializes_partial_kebab_case_toml() {
        let geometry: BackboneGeometry = toml::from_str("n-ca = 1.46\nca-c-o = 121.0").unwrap();
        assert_eq!(geometry.n_ca, 1.46);
        assert_eq!(geometry.ca_c_o, 121.0);
        assert_eq!(geometry.c_n, 1.329);
        assert!(toml::from_str::<BackboneGeometry>("bogus = 1.0").is_err());
    }

    #[test]
    fn assembled_atoms_are_numbered_in_order_and_owned_by_their_residue() {
        let built = build("GAC", &extended_conformation(3), false);
        let atoms: Vec<_> = built.structure.atoms_iter().map(|(_, atom)| atom).collect();
        assert_eq!(atoms.len(), 12);
        for (i, atom) in atoms.iter().enumerate() {
            assert_eq!(atom.serial, i + 1);
            assert_eq!(atom.residue_index, i / 4);
        }
    }

    #[test]
    fn structure_errors_surface_as_build_errors() {
        let error = BuildError::from(StructureError::ResidueOutOfBounds(7));
        assert_eq!(error, BuildError::Structure(StructureError::ResidueOutOfBounds(7)));
        assert_eq!(error.to_string(), "Residue index 7 is out of bounds");
    }
}
