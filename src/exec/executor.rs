use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use graph::{BuildGraph, NodeId, StepInstance};
use steps::{Bindings, BoundFile};

use crate::fs::Fs;

use super::{run_script, Error};

/// `GraphExecutor` realizes artifact nodes on disk.
///
/// Asked for a node, it recursively materializes every predecessor first,
/// then runs the one step instance that owns the node's incoming edges:
/// create the step directory, link the resolved input files in, write the
/// step's control files, run its script, and copy the declared outputs back
/// to the working directory. On-disk existence is the only memoization, so a
/// step shared by several demanded nodes runs once and later visits take the
/// fast path.
pub struct GraphExecutor<'a> {
    graph: &'a BuildGraph,
    fs: &'a Fs,
    working_dir: PathBuf,
    /// number of step scripts actually executed (observable for tests)
    runs: usize,
    verbose: bool,
}

impl<'a> GraphExecutor<'a> {
    pub fn new(graph: &'a BuildGraph, fs: &'a Fs, working_dir: &Path, verbose: bool) -> Self {
        Self {
            graph,
            fs,
            working_dir: working_dir.to_path_buf(),
            runs: 0,
            verbose,
        }
    }

    /// How many steps this executor has run so far.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Ensure the file behind `node` exists in the working directory,
    /// running whatever ancestor steps that takes.
    pub fn ensure_materialized(&mut self, node: NodeId) -> Result<()> {
        let Some(artifact) = self.graph.artifact(node) else {
            // parameter values have nothing to materialize
            return Ok(());
        };
        if self.fs.exists(self.working_dir.join(&artifact.file_name)) {
            return Ok(());
        }

        for pred in self.graph.predecessors(node).to_vec() {
            self.ensure_materialized(pred)?;
        }

        let Some(step_id) = self.graph.producer(node) else {
            return Err(Error::ExternalInputMissing(artifact.file_name.clone()).into());
        };
        let instance = self.graph.step(step_id);

        // a done step with a missing output means the hashing or the
        // filesystem lied to us; never retry that silently:
        if self.step_is_done(instance) {
            return Err(Error::DoneButMissing(artifact.file_name.clone()).into());
        }

        self.run_step(instance)
            .with_context(|| format!("while running step in \"{}\"", instance.dir_name))?;

        for (_, out_node) in &instance.outputs {
            let file_name = &self.graph.artifact(*out_node).expect("outputs are artifacts").file_name;
            if !self.fs.exists(self.working_dir.join(file_name)) {
                return Err(Error::ExpectedFileNotFound(file_name.clone()).into());
            }
        }
        Ok(())
    }

    /// All of the instance's declared outputs exist in the working dir.
    fn step_is_done(&self, instance: &StepInstance) -> bool {
        instance.outputs.iter().all(|(_, node)| {
            let artifact = self.graph.artifact(*node).expect("outputs are artifacts");
            self.fs.exists(self.working_dir.join(&artifact.file_name))
        })
    }

    fn run_step(&mut self, instance: &StepInstance) -> Result<()> {
        let step_dir = self.working_dir.join(&instance.dir_name);
        self.fs.create_dir(&step_dir)?;

        let bindings = self.resolve_bindings(instance);

        eprintln!(
            "{} {} in {:?}",
            "RUN".green(),
            instance.descriptor.kind.name().cyan(),
            step_dir,
        );

        // link inputs into the step dir under the names the program expects:
        for (_, file) in &bindings.inputs {
            let link = step_dir.join(&file.local_name);
            if self.fs.exists(&link) {
                self.fs.delete_file(&link)?;
            }
            self.fs
                .symlink(Path::new("..").join(&file.working_name), link)?;
        }

        let invocation = steps::invocation(&instance.descriptor, &bindings)?;
        for (name, contents) in &invocation.control_files {
            self.fs.write_file(step_dir.join(name), contents)?;
        }

        self.runs += 1;
        let success = run_script(&invocation.commands, &step_dir, self.fs, self.verbose)?;
        if !success {
            return Err(Error::SubprocessFailed(instance.dir_name.clone()).into());
        }

        // copy outputs from the step dir back into the working dir:
        for (_, file) in &bindings.outputs {
            let produced = step_dir.join(&file.local_name);
            if !self.fs.exists(&produced) {
                return Err(Error::ExpectedFileNotFound(file.local_name.clone()).into());
            }
            self.fs
                .copy(produced, self.working_dir.join(&file.working_name))?;
        }
        Ok(())
    }

    /// Resolve the instance's role→node bindings into role→file bindings.
    fn resolve_bindings(&self, instance: &StepInstance) -> Bindings {
        let desc = &instance.descriptor;
        let mut bindings = Bindings::default();

        for (role, node) in &instance.inputs {
            let artifact = self.graph.artifact(*node).expect("inputs are artifacts");
            let mandatory = desc
                .inputs
                .iter()
                .find(|spec| spec.role == *role)
                .and_then(|spec| spec.mandatory_name);
            bindings.inputs.push((
                *role,
                BoundFile {
                    working_name: artifact.file_name.clone(),
                    local_name: mandatory.unwrap_or(artifact.file_name.as_str()).to_owned(),
                },
            ));
        }

        for (role, node) in &instance.outputs {
            let artifact = self.graph.artifact(*node).expect("outputs are artifacts");
            let mandatory = desc
                .outputs
                .iter()
                .find(|spec| spec.role == *role)
                .and_then(|spec| spec.mandatory_name);
            bindings.outputs.push((
                *role,
                BoundFile {
                    working_name: artifact.file_name.clone(),
                    local_name: mandatory.unwrap_or(artifact.file_name.as_str()).to_owned(),
                },
            ));
        }

        for (role, node) in &instance.params {
            if let graph::Node::Param { value, .. } = self.graph.node(*node) {
                bindings.params.push((*role, value.clone()));
            }
        }

        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph::GraphBuilder;
    use steps::{generation_steps, ParamDict, ParamValue, ProgramDirs};

    fn write_stub(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Stand-ins for the real step programs, faithful to each one's file
    /// contract but writing placeholder contents.
    fn write_stub_programs(dir: &Path) {
        write_stub(
            dir,
            "dms",
            "while [ $# -gt 0 ]; do if [ \"$1\" = \"-o\" ]; then out=\"$2\"; fi; shift; done\n\
             echo surface > \"$out\"",
        );
        write_stub(
            dir,
            "sphgen",
            "out=$(tail -n 1 INSPH)\n\
             printf 'header line\\n    1    1.00000    2.00000    3.00000    1.400\\n' > \"$out\"",
        );
        write_stub(dir, "makespheres3", "cp \"$1\" \"$3\"");
        write_stub(dir, "makespheres1", "cp \"$2\" \"$4\"");
        write_stub(dir, "makebox", "echo box > \"$2\"");
        write_stub(
            dir,
            "qnifft",
            "phi=$(grep '^phi_file=' qnifft.parm | cut -d= -f2)\n\
             size=$(grep '^phi_size_file=' qnifft.parm | cut -d= -f2)\n\
             echo phi > \"$phi\"\necho 193 > \"$size\"",
        );
        write_stub(dir, "solvmap", "echo solv > \"$3\"");
        write_stub(dir, "chemgrid", "echo vdw > vdw.vdw\necho bmp > vdw.bmp");
    }

    fn params(spacing: f64) -> ParamDict {
        let mut p = ParamDict::new();
        p.insert(
            "matching_spheres.num_spheres".to_owned(),
            ParamValue::Int(45),
        );
        p.insert("box.margin".to_owned(), ParamValue::Float(10.0));
        p.insert("vdw.grid_spacing".to_owned(), ParamValue::Float(spacing));
        p
    }

    struct Setup {
        _dir: tempfile::TempDir,
        fs: Fs,
        working_dir: PathBuf,
        graph: graph::BuildGraph,
        combos: Vec<graph::DockFileCombo>,
    }

    fn setup(param_dicts: &[ParamDict]) -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let programs_dir = dir.path().join("programs");
        std::fs::create_dir(&programs_dir).unwrap();
        write_stub_programs(&programs_dir);
        let programs = ProgramDirs::new(&programs_dir);

        let mut builder = GraphBuilder::new();
        for p in param_dicts {
            let steps = generation_steps(p, &programs).unwrap();
            builder.add_configuration(&steps).unwrap();
        }
        let (graph, combos) = builder.finish().unwrap();

        let fs = Fs::new(dir.path(), false);
        let working_dir = dir.path().join("working");
        fs.create_dir(&working_dir).unwrap();

        // stage the externally supplied inputs:
        for (node, artifact) in graph.artifacts() {
            if graph.producer(node).is_none() {
                fs.write_file(working_dir.join(&artifact.file_name), "input contents\n")
                    .unwrap();
            }
        }

        Setup {
            _dir: dir,
            fs,
            working_dir,
            graph,
            combos,
        }
    }

    fn materialize_all(s: &Setup) -> usize {
        let mut executor = GraphExecutor::new(&s.graph, &s.fs, &s.working_dir, false);
        for combo in &s.combos {
            for node in &combo.nodes {
                executor.ensure_materialized(*node).unwrap();
            }
        }
        executor.runs()
    }

    #[test]
    fn test_materialization_runs_each_step_exactly_once() {
        let s = setup(&[params(0.2)]);
        assert_eq!(materialize_all(&s), 8);

        for combo in &s.combos {
            for node in &combo.nodes {
                let artifact = s.graph.artifact(*node).unwrap();
                assert!(
                    s.fs.exists(s.working_dir.join(&artifact.file_name)),
                    "{} missing",
                    artifact.file_name,
                );
            }
        }
    }

    #[test]
    fn test_second_materialization_runs_nothing() {
        let s = setup(&[params(0.2)]);
        assert_eq!(materialize_all(&s), 8);
        assert_eq!(materialize_all(&s), 0);
    }

    #[test]
    fn test_shared_steps_run_once_across_configurations() {
        // grid spacing diverges at the last step; everything upstream is
        // shared, so 2 configurations cost 8 + 1 runs:
        let s = setup(&[params(0.2), params(0.4)]);
        assert_eq!(materialize_all(&s), 9);

        let vdw_files: Vec<String> = s
            .graph
            .artifacts()
            .filter(|(_, a)| a.logical_name == steps::names::VDW)
            .map(|(_, a)| a.file_name.clone())
            .collect();
        assert_eq!(vdw_files.len(), 2);
        for name in vdw_files {
            assert!(s.fs.exists(s.working_dir.join(name)));
        }
    }

    #[test]
    fn test_missing_external_input_is_fatal() {
        let s = setup(&[params(0.2)]);
        // delete a staged input; materialization must fail, not run blind:
        s.fs.delete_file(s.working_dir.join("radii_1")).unwrap();
        let mut executor = GraphExecutor::new(&s.graph, &s.fs, &s.working_dir, false);
        let err = s
            .combos
            .iter()
            .flat_map(|c| c.nodes.iter())
            .find_map(|node| executor.ensure_materialized(*node).err())
            .expect("materialization should fail");
        assert!(err.to_string().contains("radii"));
    }
}
