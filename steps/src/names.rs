//! Logical file names used to wire steps together.
//!
//! These are the names steps know each other's files by; the build graph
//! assigns the numbered physical names that actually land on disk.

pub const CHARGED_RECEPTOR: &str = "rec.crg.pdb";
pub const BINDING_SITE_RESIDUES: &str = "rec.site";
pub const RADII: &str = "radii";
pub const PROTEIN_TABLE: &str = "prot.table.ambcrg.ambH";
pub const VDW_PARAMETERS: &str = "vdw.parms.amb.mindock";

pub const MOLECULAR_SURFACE: &str = "rec.ms";
pub const ALL_SPHERES: &str = "all_spheres.sph";
pub const MATCHING_SPHERES: &str = "matching_spheres.sph";
pub const LOW_DIELECTRIC_SPHERES: &str = "lowdielectric.sph";
pub const BOX: &str = "box";
pub const ELECTROSTATICS_PHI: &str = "trim.electrostatics.phi";
pub const ELECTROSTATICS_PHI_SIZE: &str = "phi.size";
pub const LIGAND_DESOLV_HEAVY: &str = "ligand.desolv.heavy";
pub const LIGAND_DESOLV_HYDROGEN: &str = "ligand.desolv.hydrogen";
pub const VDW: &str = "vdw.vdw";
pub const BUMP_MAP: &str = "vdw.bmp";

/// Files the user supplies; everything else is generated.
pub const INPUT_FILE_NAMES: [&str; 5] = [
    CHARGED_RECEPTOR,
    BINDING_SITE_RESIDUES,
    RADII,
    PROTEIN_TABLE,
    VDW_PARAMETERS,
];

/// Terminal outputs: the set of files one docking configuration needs.
/// Order here is the fixed role order of a dock-file combination.
pub const DOCK_FILE_NAMES: [&str; 7] = [
    MATCHING_SPHERES,
    ELECTROSTATICS_PHI,
    ELECTROSTATICS_PHI_SIZE,
    LIGAND_DESOLV_HEAVY,
    LIGAND_DESOLV_HYDROGEN,
    VDW,
    BUMP_MAP,
];

/// True if `logical_name` is one of the terminal dock-file roles.
pub fn is_dock_file(logical_name: &str) -> bool {
    DOCK_FILE_NAMES.contains(&logical_name)
}
