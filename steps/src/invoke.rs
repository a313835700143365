use crate::{Error, ParamValue, StepDescriptor, StepKind};

/// A file as the running step sees it: `working_name` is the numbered
/// physical name in the working directory, `local_name` the name inside the
/// step directory (differs only when the program hardwires its file names).
#[derive(Debug, Clone)]
pub struct BoundFile {
    pub working_name: String,
    pub local_name: String,
}

/// Resolved role bindings for one step instance, produced by the executor
/// from the build graph. Replaces the stringly-typed kwargs the graph edges
/// would otherwise carry.
#[derive(Debug, Default)]
pub struct Bindings {
    pub inputs: Vec<(&'static str, BoundFile)>,
    pub outputs: Vec<(&'static str, BoundFile)>,
    pub params: Vec<(&'static str, ParamValue)>,
}

impl Bindings {
    fn input(&self, kind: StepKind, role: &'static str) -> Result<&BoundFile, Error> {
        self.inputs
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, f)| f)
            .ok_or(Error::UnboundRole(kind.name(), role))
    }

    fn output(&self, kind: StepKind, role: &'static str) -> Result<&BoundFile, Error> {
        self.outputs
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, f)| f)
            .ok_or(Error::UnboundRole(kind.name(), role))
    }

    fn param(&self, kind: StepKind, role: &'static str) -> Result<&ParamValue, Error> {
        self.params
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, v)| v)
            .ok_or(Error::UnboundRole(kind.name(), role))
    }
}

/// Everything the executor must do inside a step directory: write these
/// control files, then run these shell lines in order.
#[derive(Debug)]
pub struct Invocation {
    pub control_files: Vec<(String, String)>,
    pub commands: Vec<String>,
}

const SPHGEN_CONTROL_FILE: &str = "INSPH";
const CHEMGRID_CONTROL_FILE: &str = "INCHEM";
const QNIFFT_CONTROL_FILE: &str = "qnifft.parm";

// sphgen control lines 2-6: sphere type, surface points flag, then
// min/max radius and probe radius.
const SPHGEN_FIXED_LINES: &str = "R\nX\n0.\n5.0\n1.4";

const LOW_DIELECTRIC_MIN_NUM_SPHERES: u32 = 25;
const SURFACE_DENSITY: f64 = 1.0;
const HEAVY_PROBE_RADIUS: f64 = 1.4;
const HYDROGEN_PROBE_RADIUS: f64 = 1.0;

/// Build the invocation plan for one step.
pub fn invocation(desc: &StepDescriptor, b: &Bindings) -> Result<Invocation, Error> {
    let kind = desc.kind;
    let prog = desc.program.display();
    let mut control_files = Vec::with_capacity(1);
    let mut commands = Vec::with_capacity(2);

    match kind {
        StepKind::MolecularSurface => {
            let rec = &b.input(kind, "charged_receptor_infile")?.local_name;
            let site = &b.input(kind, "binding_site_residues_infile")?.local_name;
            let out = &b.output(kind, "molecular_surface_outfile")?.local_name;
            // dms crashes on waters, so strip them from everything it reads.
            commands.push(format!("grep -a -v HOH {rec} > {rec}.dms"));
            commands.push(format!("grep -a -v HOH {site} > {site}.dms"));
            commands.push(format!(
                "{prog} {rec}.dms -a -d {SURFACE_DENSITY} -i {site}.dms -g dms.log -p -n -o {out}"
            ));
        }
        StepKind::SphereGeneration => {
            let surface = &b.input(kind, "molecular_surface_infile")?.local_name;
            let out = &b.output(kind, "spheres_outfile")?.local_name;
            control_files.push((
                SPHGEN_CONTROL_FILE.to_owned(),
                format!("{surface}\n{SPHGEN_FIXED_LINES}\n{out}\n"),
            ));
            commands.push(format!("{prog}"));
            // sphgen writes a header line the downstream programs choke on:
            commands.push(format!("sed -i '1d' {out}"));
        }
        StepKind::MatchingSpheres => {
            let spheres = &b.input(kind, "all_spheres_infile")?.local_name;
            let site = &b.input(kind, "binding_site_residues_infile")?.local_name;
            let out = &b.output(kind, "matching_spheres_outfile")?.local_name;
            let n = b.param(kind, "num_spheres")?.as_int("num_spheres")?;
            commands.push(format!("{prog} {spheres} {site} {out} {n}"));
        }
        StepKind::LowDielectricSpheres => {
            let matching = &b.input(kind, "matching_spheres_infile")?.local_name;
            let spheres = &b.input(kind, "all_spheres_infile")?.local_name;
            let rec = &b.input(kind, "charged_receptor_infile")?.local_name;
            let out = &b.output(kind, "low_dielectric_spheres_outfile")?.local_name;
            commands.push(format!(
                "{prog} {matching} {spheres} {rec} {out} {LOW_DIELECTRIC_MIN_NUM_SPHERES}"
            ));
        }
        StepKind::BoxGeneration => {
            let matching = &b.input(kind, "matching_spheres_infile")?.local_name;
            let out = &b.output(kind, "box_outfile")?.local_name;
            let margin = b.param(kind, "margin")?.as_float("margin")?;
            commands.push(format!("{prog} {matching} {out} {margin}"));
        }
        StepKind::ElectrostaticsGrid => {
            let rec = &b.input(kind, "charged_receptor_infile")?.local_name;
            let spheres = &b.input(kind, "low_dielectric_spheres_infile")?.local_name;
            let boxf = &b.input(kind, "box_infile")?.local_name;
            let phi = &b.output(kind, "electrostatics_phi_outfile")?.local_name;
            let phi_size = &b.output(kind, "electrostatics_phi_size_outfile")?.local_name;
            control_files.push((
                QNIFFT_CONTROL_FILE.to_owned(),
                format!(
                    "charge_file={rec}\nspheres_file={spheres}\nbox_file={boxf}\n\
                     phi_file={phi}\nphi_size_file={phi_size}\n"
                ),
            ));
            commands.push(format!("{prog} {QNIFFT_CONTROL_FILE}"));
        }
        StepKind::LigandDesolvation => {
            let rec = &b.input(kind, "charged_receptor_infile")?.local_name;
            let boxf = &b.input(kind, "box_infile")?.local_name;
            let heavy = &b.output(kind, "heavy_outfile")?.local_name;
            let hydrogen = &b.output(kind, "hydrogen_outfile")?.local_name;
            commands.push(format!("{prog} {rec} {boxf} {heavy} {HEAVY_PROBE_RADIUS}"));
            commands.push(format!(
                "{prog} {rec} {boxf} {hydrogen} {HYDROGEN_PROBE_RADIUS}"
            ));
        }
        StepKind::VdwGrid => {
            let rec = &b.input(kind, "charged_receptor_infile")?.local_name;
            let table = &b.input(kind, "protein_table_infile")?.local_name;
            let parms = &b.input(kind, "vdw_parameters_infile")?.local_name;
            let boxf = &b.input(kind, "box_infile")?.local_name;
            let spacing = b.param(kind, "grid_spacing")?.as_float("grid_spacing")?;
            // chemgrid reads everything from a parameters file named INCHEM,
            // and writes vdw.<ext> next to it; the trailing numbers are grid
            // construction constants inherited from the program's docs.
            control_files.push((
                CHEMGRID_CONTROL_FILE.to_owned(),
                format!(
                    "{rec}\n{table}\n{parms}\n{boxf}\n{spacing}\n1\n4\n10\n2.3 2.6\nvdw\n"
                ),
            ));
            commands.push(format!("{prog}"));
        }
    }

    Ok(Invocation {
        control_files,
        commands,
    })
}
