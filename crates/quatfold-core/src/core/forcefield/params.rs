use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Harmonic bond stretch `k (r - r0)²`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BondParam {
    /// Force constant in kcal/(mol·Å²).
    pub k: f64,
    /// Equilibrium length in Å.
    pub r0: f64,
}

/// Harmonic angle bend `k (θ - θ0)²`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AngleParam {
    /// Force constant in kcal/(mol·rad²).
    pub k: f64,
    /// Equilibrium angle in degrees.
    pub theta0: f64,
}

/// One Fourier term `(V/2)(1 + cos(nφ - γ))`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TorsionParam {
    /// Barrier height V in kcal/mol.
    pub barrier: f64,
    pub periodicity: u32,
    /// Phase γ in degrees.
    pub phase: f64,
}

/// Lennard-Jones parameters of one element, AMBER style.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VdwParam {
    /// Half of the pair distance at the energy minimum, in Å.
    pub r_min_half: f64,
    /// Well depth in kcal/mol.
    pub well_depth: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GlobalParams {
    /// Slope of the distance-dependent dielectric `ε(r) = slope · r`.
    pub dielectric_slope: f64,
    /// Scale applied to van der Waals energies of 1-4 pairs.
    pub scale_14_vdw: f64,
    /// Scale applied to electrostatic energies of 1-4 pairs.
    pub scale_14_elec: f64,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            dielectric_slope: 4.0,
            scale_14_vdw: 0.5,
            scale_14_elec: 1.0 / 1.2,
        }
    }
}

/// Literature-derived constants of the backbone force field.
///
/// Bonds are keyed by atom-name pairs (`"N-CA"`), angles by triples (`"N-CA-C"`) and
/// torsions by quadruples (`"C-N-CA-C"`); lookups accept either direction. Van der Waals
/// parameters are keyed by element symbol and partial charges by atom name.
///
/// The built-in defaults combine Engh & Huber geometry with AMBER ff99SB force constants,
/// non-bonded parameters and charges. A TOML file may replace any table; tables it omits
/// keep their defaults.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ForceField {
    pub globals: GlobalParams,
    pub bonds: HashMap<String, BondParam>,
    pub angles: HashMap<String, AngleParam>,
    pub torsions: HashMap<String, Vec<TorsionParam>>,
    pub vdw: HashMap<String, VdwParam>,
    pub charges: HashMap<String, f64>,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Van der Waals parameters used for elements missing from the table.
const FALLBACK_VDW: VdwParam = VdwParam {
    r_min_half: 1.9,
    well_depth: 0.1,
};

impl Default for ForceField {
    fn default() -> Self {
        let bonds = [
            ("N-CA", 337.0, 1.458),
            ("CA-C", 317.0, 1.523),
            ("C-N", 490.0, 1.329),
            ("C-O", 570.0, 1.231),
            ("C-OXT", 656.0, 1.25),
            ("N-H", 434.0, 1.01),
            ("CA-HA", 340.0, 1.09),
        ]
        .into_iter()
        .map(|(key, k, r0)| (key.to_string(), BondParam { k, r0 }))
        .collect();

        let angles = [
            ("N-CA-C", 63.0, 111.2),
            ("CA-C-N", 70.0, 116.2),
            ("C-N-CA", 50.0, 121.7),
            ("CA-C-O", 80.0, 120.5),
            ("O-C-N", 80.0, 123.3),
            ("CA-C-OXT", 70.0, 117.0),
            ("O-C-OXT", 80.0, 126.0),
            ("C-N-H", 50.0, 119.15),
            ("H-N-CA", 50.0, 119.15),
            ("N-CA-HA", 50.0, 109.5),
            ("C-CA-HA", 50.0, 109.5),
        ]
        .into_iter()
        .map(|(key, k, theta0)| (key.to_string(), AngleParam { k, theta0 }))
        .collect();

        let torsion = |barrier, periodicity, phase| TorsionParam {
            barrier,
            periodicity,
            phase,
        };
        let torsions = HashMap::from([
            // phi
            (
                "C-N-CA-C".to_string(),
                vec![torsion(0.0, 1, 0.0), torsion(0.8, 2, 180.0), torsion(0.4, 3, 0.0)],
            ),
            // psi
            (
                "N-CA-C-N".to_string(),
                vec![torsion(0.9, 1, 180.0), torsion(1.6, 2, 180.0), torsion(0.4, 3, 180.0)],
            ),
            // omega
            ("CA-C-N-CA".to_string(), vec![torsion(10.0, 2, 180.0)]),
        ]);

        let vdw = [
            ("C", 1.908, 0.086),
            ("N", 1.824, 0.17),
            ("O", 1.6612, 0.21),
            ("H", 1.1, 0.0157),
            ("S", 2.0, 0.25),
        ]
        .into_iter()
        .map(|(key, r_min_half, well_depth)| {
            (
                key.to_string(),
                VdwParam {
                    r_min_half,
                    well_depth,
                },
            )
        })
        .collect();

        let charges = [
            ("N", -0.4157),
            ("H", 0.2719),
            ("CA", 0.0337),
            ("HA", 0.0823),
            ("C", 0.5973),
            ("O", -0.5679),
        ]
        .into_iter()
        .map(|(key, q)| (key.to_string(), q))
        .collect();

        Self {
            globals: GlobalParams::default(),
            bonds,
            angles,
            torsions,
            vdw,
            charges,
        }
    }
}

impl ForceField {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn bond(&self, a: &str, b: &str) -> Option<&BondParam> {
        self.bonds
            .get(&format!("{a}-{b}"))
            .or_else(|| self.bonds.get(&format!("{b}-{a}")))
    }

    pub fn angle(&self, a: &str, b: &str, c: &str) -> Option<&AngleParam> {
        self.angles
            .get(&format!("{a}-{b}-{c}"))
            .or_else(|| self.angles.get(&format!("{c}-{b}-{a}")))
    }

    pub fn torsion(&self, a: &str, b: &str, c: &str, d: &str) -> Option<&[TorsionParam]> {
        self.torsions
            .get(&format!("{a}-{b}-{c}-{d}"))
            .or_else(|| self.torsions.get(&format!("{d}-{c}-{b}-{a}")))
            .map(Vec::as_slice)
    }

    pub fn vdw(&self, element: &str) -> VdwParam {
        self.vdw.get(element).copied().unwrap_or(FALLBACK_VDW)
    }

    pub fn charge(&self, atom_name: &str) -> f64 {
        self.charges.get(atom_name).copied().unwrap_or(0.0)
    }
}
