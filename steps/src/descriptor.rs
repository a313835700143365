use std::path::{Path, PathBuf};

use crate::ParamValue;

/// The operation a step performs, naming the external program that does the
/// actual work. Adding a variant means adding a catalog entry and an
/// invocation plan; nothing else needs to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    MolecularSurface,
    SphereGeneration,
    MatchingSpheres,
    LowDielectricSpheres,
    BoxGeneration,
    ElectrostaticsGrid,
    LigandDesolvation,
    VdwGrid,
}

impl StepKind {
    /// Stable identity string; part of every step hash.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MolecularSurface => "MolecularSurface",
            Self::SphereGeneration => "SphereGeneration",
            Self::MatchingSpheres => "MatchingSpheres",
            Self::LowDielectricSpheres => "LowDielectricSpheres",
            Self::BoxGeneration => "BoxGeneration",
            Self::ElectrostaticsGrid => "ElectrostaticsGrid",
            Self::LigandDesolvation => "LigandDesolvation",
            Self::VdwGrid => "VdwGrid",
        }
    }

    /// Original working-directory name, before the merge pass numbers it.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::MolecularSurface => "molecular_surface",
            Self::SphereGeneration => "sphere_generation",
            Self::MatchingSpheres => "matching_spheres",
            Self::LowDielectricSpheres => "low_dielectric_spheres",
            Self::BoxGeneration => "box_generation",
            Self::ElectrostaticsGrid => "electrostatics_grid",
            Self::LigandDesolvation => "ligand_desolvation",
            Self::VdwGrid => "vdw_grid",
        }
    }

    pub fn program_name(&self) -> &'static str {
        match self {
            Self::MolecularSurface => "dms",
            Self::SphereGeneration => "sphgen",
            Self::MatchingSpheres => "makespheres3",
            Self::LowDielectricSpheres => "makespheres1",
            Self::BoxGeneration => "makebox",
            Self::ElectrostaticsGrid => "qnifft",
            Self::LigandDesolvation => "solvmap",
            Self::VdwGrid => "chemgrid",
        }
    }
}

/// Where to find the external step programs.
///
/// Tests point this at a directory of stub scripts.
#[derive(Debug, Clone)]
pub struct ProgramDirs {
    dir: PathBuf,
}

impl ProgramDirs {
    pub const ENV_VAR: &'static str = "DOCKOPT_PROGRAMS_DIR";
    const DEFAULT_DIR: &'static str = "/opt/dockopt/programs";

    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Resolve from `DOCKOPT_PROGRAMS_DIR`, falling back to the install default.
    pub fn from_env() -> Self {
        match std::env::var(Self::ENV_VAR) {
            Ok(dir) => Self::new(dir.as_ref()),
            Err(_) => Self::new(Self::DEFAULT_DIR.as_ref()),
        }
    }

    pub fn resolve(&self, kind: StepKind) -> PathBuf {
        self.dir.join(kind.program_name())
    }
}

/// One declared input: the role the step knows the file by, plus the logical
/// name that wires it to another step's output (or to a user-supplied file).
/// `mandatory_name` is set when the program insists on reading a fixed file
/// name from its working directory.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub role: &'static str,
    pub logical_name: String,
    pub mandatory_name: Option<&'static str>,
}

/// One declared output. `mandatory_name` is set when the program hardwires
/// the on-disk name it writes (the graph's numbered physical name is only
/// applied once the file is copied back to the working directory).
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub role: &'static str,
    pub logical_name: String,
    pub mandatory_name: Option<&'static str>,
}

/// One declared scalar parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub role: &'static str,
    pub value: ParamValue,
}

/// Pure declaration of one unit of work: no I/O happens until the executor
/// runs the owning step instance.
#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub kind: StepKind,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
    pub params: Vec<ParamSpec>,
    pub program: PathBuf,
}

impl StepDescriptor {
    pub fn new(kind: StepKind, programs: &ProgramDirs) -> Self {
        Self {
            kind,
            inputs: Vec::with_capacity(4),
            outputs: Vec::with_capacity(2),
            params: Vec::with_capacity(1),
            program: programs.resolve(kind),
        }
    }

    pub fn input(mut self, role: &'static str, logical_name: &str) -> Self {
        self.inputs.push(InputSpec {
            role,
            logical_name: logical_name.to_owned(),
            mandatory_name: None,
        });
        self
    }

    pub fn input_named(
        mut self,
        role: &'static str,
        logical_name: &str,
        mandatory_name: &'static str,
    ) -> Self {
        self.inputs.push(InputSpec {
            role,
            logical_name: logical_name.to_owned(),
            mandatory_name: Some(mandatory_name),
        });
        self
    }

    pub fn output(mut self, role: &'static str, logical_name: &str) -> Self {
        self.outputs.push(OutputSpec {
            role,
            logical_name: logical_name.to_owned(),
            mandatory_name: None,
        });
        self
    }

    pub fn output_named(
        mut self,
        role: &'static str,
        logical_name: &str,
        mandatory_name: &'static str,
    ) -> Self {
        self.outputs.push(OutputSpec {
            role,
            logical_name: logical_name.to_owned(),
            mandatory_name: Some(mandatory_name),
        });
        self
    }

    pub fn param(mut self, role: &'static str, value: ParamValue) -> Self {
        self.params.push(ParamSpec { role, value });
        self
    }

    /// File name component of the program path; part of every step hash so a
    /// swapped program binary invalidates cached outputs.
    pub fn program_file_name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }
}
