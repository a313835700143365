use std::path::Path;

use anyhow::{Context, Result};
use graph::{BuildGraph, DockFileCombo};
use steps::{ParamDict, ParamValue};

use crate::fs::Fs;

use super::{perturb, Error};

pub const INDOCK_FILE_NAME: &str = "INDOCK";

/// The named dock-file bundle one docking run consumes, resolved to the
/// physical file names in the working directory. Field order matches the
/// fixed dock-file role order of the build graph's combinations.
#[derive(Debug, Clone)]
pub struct DockFilesSet {
    pub matching_spheres_file: String,
    pub electrostatics_phi_file: String,
    pub electrostatics_phi_size_file: String,
    pub ligand_desolvation_heavy_file: String,
    pub ligand_desolvation_hydrogen_file: String,
    pub vdw_file: String,
    pub bump_map_file: String,
}

impl DockFilesSet {
    pub fn from_combo(graph: &BuildGraph, combo: &DockFileCombo) -> Self {
        let name = |i: usize| {
            graph
                .artifact(combo.nodes[i])
                .expect("dock file nodes are artifacts")
                .file_name
                .clone()
        };
        Self {
            matching_spheres_file: name(0),
            electrostatics_phi_file: name(1),
            electrostatics_phi_size_file: name(2),
            ligand_desolvation_heavy_file: name(3),
            ligand_desolvation_hydrogen_file: name(4),
            vdw_file: name(5),
            bump_map_file: name(6),
        }
    }

    /// (role, file name) pairs, for the results table's dockfiles columns.
    pub fn named(&self) -> Vec<(String, String)> {
        vec![
            ("matching_spheres_file".into(), self.matching_spheres_file.clone()),
            ("electrostatics_phi_file".into(), self.electrostatics_phi_file.clone()),
            ("electrostatics_phi_size_file".into(), self.electrostatics_phi_size_file.clone()),
            ("ligand_desolvation_heavy_file".into(), self.ligand_desolvation_heavy_file.clone()),
            ("ligand_desolvation_hydrogen_file".into(), self.ligand_desolvation_hydrogen_file.clone()),
            ("vdw_file".into(), self.vdw_file.clone()),
            ("bump_map_file".into(), self.bump_map_file.clone()),
        ]
    }
}

/// The terminal product of one root-to-leaf traversal: a dock executable, a
/// dock-file bundle, a generated control file, and the fully flattened
/// parameters that produced them.
#[derive(Debug)]
pub struct DockingConfiguration {
    pub dock_executable_path: String,
    pub dock_files: DockFilesSet,
    pub indock_file_name: String,
    pub params: ParamDict,
}

/// Cross the materialized dock-file combinations with the modification and
/// control-file parameter grids (and the dock executables), expanding each
/// base combination into perturbed variants when perturbation is on, and
/// write one INDOCK control file per resulting configuration.
#[allow(clippy::too_many_arguments)]
pub fn assemble_configurations(
    fs: &Fs,
    working_dir: &Path,
    graph: &BuildGraph,
    combos: &[DockFileCombo],
    generation_dicts: &[ParamDict],
    modification_dicts: &[ParamDict],
    indock_dicts: &[ParamDict],
    dock_executables: &[String],
) -> Result<Vec<DockingConfiguration>> {
    debug_assert_eq!(combos.len(), generation_dicts.len());
    let perturbing = perturb::uniform_use_flag(modification_dicts)?;

    // expand (dock files, generation params, modification params) triples,
    // fanning each base combination out into its perturbed variants:
    let mut bundles: Vec<(DockFilesSet, &ParamDict, &ParamDict)> = Vec::new();
    for modification in modification_dicts {
        for (combo, generation) in combos.iter().zip(generation_dicts) {
            let files = DockFilesSet::from_combo(graph, combo);
            if perturbing {
                let variants = perturb::perturb_matching_spheres(
                    fs,
                    working_dir,
                    &files.matching_spheres_file,
                    modification,
                )?;
                for variant in variants {
                    let mut variant_files = files.clone();
                    variant_files.matching_spheres_file = variant;
                    bundles.push((variant_files, generation, modification));
                }
            } else {
                bundles.push((files, generation, modification));
            }
        }
    }

    let mut configurations = Vec::with_capacity(
        dock_executables.len() * bundles.len() * indock_dicts.len(),
    );
    for dock_executable in dock_executables {
        for (files, generation, modification) in &bundles {
            for indock in indock_dicts {
                let i = configurations.len();
                let indock_file_name = format!("{}_{}", INDOCK_FILE_NAME, i + 1);

                let mut params = ParamDict::new();
                params.insert(
                    "dock_executable_path".to_owned(),
                    ParamValue::Str(dock_executable.clone()),
                );
                for (k, v) in *generation {
                    params.insert(format!("dock_files_generation.{k}"), v.clone());
                }
                for (k, v) in *modification {
                    params.insert(format!("dock_files_modification.{k}"), v.clone());
                }
                for (k, v) in indock {
                    params.insert(format!("indock.{k}"), v.clone());
                }

                write_indock(fs, working_dir, &indock_file_name, files, indock)?;

                configurations.push(DockingConfiguration {
                    dock_executable_path: dock_executable.clone(),
                    dock_files: files.clone(),
                    indock_file_name,
                    params,
                });
            }
        }
    }
    Ok(configurations)
}

/// Write the main parameters file the docking program reads. File references
/// point into the working directory; the run script stages them from there.
pub fn write_indock(
    fs: &Fs,
    working_dir: &Path,
    indock_file_name: &str,
    dock_files: &DockFilesSet,
    indock_params: &ParamDict,
) -> Result<()> {
    let phi_size = read_phi_size(fs, working_dir, &dock_files.electrostatics_phi_size_file)?;

    let get = |key: &str| -> Result<&ParamValue> {
        indock_params
            .get(key)
            .ok_or_else(|| Error::MissingIndockParam(key.to_owned()).into())
    };

    let mut text = String::with_capacity(1536);
    text.push_str("DOCK 3.8 parameter\n");
    let mut line = |key: &str, value: &dyn std::fmt::Display| {
        text.push_str(&format!("{key:<30}{value}\n"));
    };

    line("output_file_prefix", &"test.");
    line("match_method", &2);
    line("distance_tolerance", get("distance_tolerance")?);
    line("match_goal", get("match_goal")?);
    line("nodes_maximum", get("nodes_maximum")?);
    line("nodes_minimum", get("nodes_minimum")?);
    line("bump_maximum", get("bump_maximum")?);
    line("number_save", get("number_save")?);
    line("number_write", get("number_write")?);
    line("ligand_desolv_scale", get("ligand_desolv_scale")?);
    line("electrostatic_scale", get("electrostatic_scale")?);
    line("vdw_scale", get("vdw_scale")?);
    line("internal_scale", get("internal_scale")?);
    line("receptor_sphere_file", &dock_files.matching_spheres_file);
    line("delphi_nsize", &phi_size);
    line("delphi_file", &dock_files.electrostatics_phi_file);
    line("chemgrid_file", &dock_files.vdw_file);
    line("bumpmap_file", &dock_files.bump_map_file);
    line("solvmap_file", &dock_files.ligand_desolvation_heavy_file);
    line("hydrogen_solvmap_file", &dock_files.ligand_desolvation_hydrogen_file);

    fs.write_file(working_dir.join(indock_file_name), &text)
        .context("writing INDOCK file")
}

/// The electrostatics grid's size file holds a single integer the control
/// file must repeat back to the docking program.
fn read_phi_size(fs: &Fs, working_dir: &Path, file_name: &str) -> Result<i64> {
    let text = fs.read_to_string(working_dir.join(file_name))?;
    text.trim()
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .parse()
        .map_err(|_| Error::MalformedPhiSizeFile(file_name.to_owned()).into())
}
