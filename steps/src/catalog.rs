use crate::param::{self, ParamDict};
use crate::{names, Error, ParamSpec, ProgramDirs, StepDescriptor, StepKind};

/// Build the ordered list of steps that generate one complete dock-file set
/// from the user-supplied input files, for one resolved parameter set.
///
/// Steps are returned in topological order: every input logical name is
/// either a user-supplied file or an output of an earlier entry. The build
/// graph relies on that ordering when it hashes inputs before steps.
pub fn generation_steps(
    params: &ParamDict,
    programs: &ProgramDirs,
) -> Result<Vec<StepDescriptor>, Error> {
    let num_spheres = param::require(params, "matching_spheres.num_spheres")?;
    let box_margin = param::require(params, "box.margin")?;
    let grid_spacing = param::require(params, "vdw.grid_spacing")?;

    // reject bad types up front, before any graph is built:
    num_spheres.as_int("matching_spheres.num_spheres")?;
    box_margin.as_float("box.margin")?;
    grid_spacing.as_float("vdw.grid_spacing")?;

    let steps = vec![
        StepDescriptor::new(StepKind::MolecularSurface, programs)
            .input("charged_receptor_infile", names::CHARGED_RECEPTOR)
            .input("binding_site_residues_infile", names::BINDING_SITE_RESIDUES)
            // dms reads element radii from a file in its working directory
            // that must be called exactly "radii":
            .input_named("radii_infile", names::RADII, "radii")
            .output("molecular_surface_outfile", names::MOLECULAR_SURFACE),
        StepDescriptor::new(StepKind::SphereGeneration, programs)
            .input("molecular_surface_infile", names::MOLECULAR_SURFACE)
            .output("spheres_outfile", names::ALL_SPHERES),
        StepDescriptor::new(StepKind::MatchingSpheres, programs)
            .input("all_spheres_infile", names::ALL_SPHERES)
            .input("binding_site_residues_infile", names::BINDING_SITE_RESIDUES)
            .output("matching_spheres_outfile", names::MATCHING_SPHERES)
            .param("num_spheres", num_spheres.clone()),
        StepDescriptor::new(StepKind::LowDielectricSpheres, programs)
            .input("matching_spheres_infile", names::MATCHING_SPHERES)
            .input("all_spheres_infile", names::ALL_SPHERES)
            .input("charged_receptor_infile", names::CHARGED_RECEPTOR)
            .output("low_dielectric_spheres_outfile", names::LOW_DIELECTRIC_SPHERES),
        StepDescriptor::new(StepKind::BoxGeneration, programs)
            .input("matching_spheres_infile", names::MATCHING_SPHERES)
            .output("box_outfile", names::BOX)
            .param("margin", box_margin.clone()),
        StepDescriptor::new(StepKind::ElectrostaticsGrid, programs)
            .input("charged_receptor_infile", names::CHARGED_RECEPTOR)
            .input("low_dielectric_spheres_infile", names::LOW_DIELECTRIC_SPHERES)
            .input("box_infile", names::BOX)
            .output("electrostatics_phi_outfile", names::ELECTROSTATICS_PHI)
            .output("electrostatics_phi_size_outfile", names::ELECTROSTATICS_PHI_SIZE),
        StepDescriptor::new(StepKind::LigandDesolvation, programs)
            .input("charged_receptor_infile", names::CHARGED_RECEPTOR)
            .input("box_infile", names::BOX)
            .output("heavy_outfile", names::LIGAND_DESOLV_HEAVY)
            .output("hydrogen_outfile", names::LIGAND_DESOLV_HYDROGEN),
        StepDescriptor::new(StepKind::VdwGrid, programs)
            .input("protein_table_infile", names::PROTEIN_TABLE)
            .input("vdw_parameters_infile", names::VDW_PARAMETERS)
            .input("charged_receptor_infile", names::CHARGED_RECEPTOR)
            .input("box_infile", names::BOX)
            .output_named("vdw_outfile", names::VDW, "vdw.vdw")
            .output_named("bump_map_outfile", names::BUMP_MAP, "vdw.bmp")
            .param("grid_spacing", grid_spacing.clone()),
    ];

    Ok(steps)
}
