use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use steps::ParamValue;

use crate::fs::Fs;

/// Written by `--init`; a small two-value search so a fresh job does
/// something interesting out of the box.
pub const DEFAULT_CONFIG_YAML: &str = "\
pipeline:
  criterion: enrichment_score
  top_n: 1
  components:
    - step:
        parameters:
          dock_files_generation:
            matching_spheres.num_spheres: 45
            box.margin: 10.0
            vdw.grid_spacing: [0.2, 0.4]
          dock_files_modification:
            matching_spheres_perturbation.use: false
            matching_spheres_perturbation.num_samples_per_matching_spheres_file: 1
            matching_spheres_perturbation.max_deviation_angstroms: 0.0
            matching_spheres_perturbation.seed: 0
          indock:
            distance_tolerance: 1.5
            match_goal: 1000
            nodes_maximum: 4
            nodes_minimum: 4
            bump_maximum: 100.0
            electrostatic_scale: 1.0
            vdw_scale: 1.0
            internal_scale: 0.0
            ligand_desolv_scale: 1.0
            number_save: 1
            number_write: 1
";

/// Top level of the job config file.
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    pub criterion: String,
    pub top_n: usize,
    pub components: Vec<ComponentConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ComponentConfig {
    pub step: StepConfig,
}

#[derive(Debug, Deserialize)]
pub struct StepConfig {
    pub parameters: ParametersConfig,
}

/// The three searched parameter namespaces plus the optional custom dock
/// executable. Any leaf may be multivalued; see `expand`.
#[derive(Debug, Deserialize)]
pub struct ParametersConfig {
    pub dock_files_generation: BTreeMap<String, ParamEntry>,
    pub dock_files_modification: BTreeMap<String, ParamEntry>,
    pub indock: BTreeMap<String, ParamEntry>,
    #[serde(default)]
    pub custom_dock_executable: Option<ParamEntry>,
}

/// One config leaf: a scalar, an explicit list of scalars, or a numerical
/// operator applied to a reference value ('^' references the best value of
/// the same parameter from the previous pipeline component).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParamEntry {
    Operator {
        reference_value: Scalar,
        operator: String,
        arguments: Vec<Scalar>,
    },
    Many(Vec<Scalar>),
    One(Scalar),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&Scalar> for ParamValue {
    fn from(s: &Scalar) -> Self {
        match s {
            Scalar::Bool(b) => ParamValue::Bool(*b),
            Scalar::Int(i) => ParamValue::Int(*i),
            Scalar::Float(x) => ParamValue::Float(*x),
            Scalar::Str(s) => ParamValue::Str(s.clone()),
        }
    }
}

/// Load and deserialize the job config file.
pub fn load(fs: &Fs, path: &std::path::Path) -> Result<ConfigFile> {
    let text = fs.read_to_string(path)?;
    let config: ConfigFile = serde_yaml::from_str(&text)
        .with_context(|| format!("while parsing config file {:?}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: ConfigFile = serde_yaml::from_str(DEFAULT_CONFIG_YAML).unwrap();
        assert_eq!(config.pipeline.criterion, "enrichment_score");
        assert_eq!(config.pipeline.components.len(), 1);
        let params = &config.pipeline.components[0].step.parameters;
        assert!(matches!(
            params.dock_files_generation.get("vdw.grid_spacing"),
            Some(ParamEntry::Many(v)) if v.len() == 2
        ));
    }

    #[test]
    fn test_operator_entry_parses() {
        let yaml = "\
reference_value: '^'
operator: '*'
arguments: [0.5, 1.0, 2.0]
";
        let entry: ParamEntry = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(entry, ParamEntry::Operator { .. }));
    }
}
