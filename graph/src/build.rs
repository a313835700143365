use steps::{names, StepDescriptor};

use crate::graph::PendingStep;
use crate::{hash, BuildGraph, ContentHash, Edge, Error, Node, NodeId, TupleHasher};

/// The demanded terminal outputs of one configuration, in the fixed
/// dock-file role order of [`names::DOCK_FILE_NAMES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockFileCombo {
    pub nodes: Vec<NodeId>,
}

/// Builds one merged `BuildGraph` from any number of configurations' step
/// lists. Within a configuration, artifacts are deduplicated by logical file
/// name; across configurations, by content hash.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: BuildGraph,
    combos: Vec<DockFileCombo>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one configuration's ordered step list (catalog order is
    /// topological, so each step's inputs are hashed before the step is).
    pub fn add_configuration(&mut self, steps: &[StepDescriptor]) -> Result<(), Error> {
        let mut name_to_hash: util::HashMap<String, ContentHash> = util::HashMap::default();
        let mut produced: util::HashSet<String> = util::HashSet::default();
        let mut dock_nodes: util::HashMap<String, NodeId> = util::HashMap::default();

        for step in steps {
            let step_name = step.kind.name();

            // inputs not yet seen in this configuration are externally
            // supplied files, hashed from their logical name alone:
            let mut input_entries = Vec::with_capacity(step.inputs.len());
            for spec in &step.inputs {
                let h = name_to_hash
                    .entry(spec.logical_name.clone())
                    .or_insert_with(|| hash::hash_one(&spec.logical_name))
                    .clone();
                input_entries.push((spec.role, h, spec.logical_name.clone()));
            }

            let mut param_entries = Vec::with_capacity(step.params.len());
            for spec in &step.params {
                let h = hash::hash_pair(spec.role, &spec.value);
                param_entries.push((spec.role, h, spec.value.clone()));
            }

            let step_hash = compute_step_hash(step, &input_entries, &param_entries);

            // register outputs; an output name that already exists in this
            // configuration is fatal either way, but we distinguish the
            // feedback case since it means the catalog declared a cycle:
            let mut output_entries = Vec::with_capacity(step.outputs.len());
            for spec in &step.outputs {
                if produced.contains(&spec.logical_name) {
                    return Err(Error::DuplicateOutput(
                        step_name.to_owned(),
                        spec.logical_name.clone(),
                    ));
                }
                if name_to_hash.contains_key(&spec.logical_name) {
                    return Err(Error::OutputFeedsAncestor(
                        step_name.to_owned(),
                        spec.logical_name.clone(),
                    ));
                }
                let h = hash::hash_pair(&step_hash, &spec.logical_name);
                name_to_hash.insert(spec.logical_name.clone(), h.clone());
                produced.insert(spec.logical_name.clone());
                output_entries.push((spec.role, h, spec.logical_name.clone()));
            }

            // intern nodes (identical hashes coalesce across configurations):
            let input_nodes = self.intern_artifacts(&input_entries);
            let output_nodes = self.intern_artifacts(&output_entries);
            let param_nodes: Vec<(&'static str, NodeId)> = param_entries
                .iter()
                .map(|(role, h, value)| {
                    let id = self.graph.intern_node(h.clone(), || Node::Param {
                        name: (*role).to_owned(),
                        value: value.clone(),
                    });
                    (*role, id)
                })
                .collect();

            for ((_, _, logical_name), (_, id)) in output_entries.iter().zip(output_nodes.iter()) {
                if names::is_dock_file(logical_name) {
                    dock_nodes.insert(logical_name.clone(), *id);
                }
            }

            // complete bipartite edge sets: every input and every param
            // blocks every output.
            for (src_role, src) in input_nodes.iter().chain(param_nodes.iter()) {
                for (dst_role, dst) in &output_nodes {
                    self.graph.add_edge(Edge {
                        src: *src,
                        dst: *dst,
                        src_role: *src_role,
                        dst_role: *dst_role,
                        step_hash: step_hash.clone(),
                        step: None,
                    });
                }
            }

            self.graph.record_pending(
                step_hash,
                PendingStep {
                    descriptor: step.clone(),
                    inputs: input_nodes,
                    outputs: output_nodes,
                    params: param_nodes,
                },
            );
        }

        let mut combo = Vec::with_capacity(names::DOCK_FILE_NAMES.len());
        for name in names::DOCK_FILE_NAMES {
            let id = dock_nodes.get(name).ok_or(Error::MissingDockFile(name))?;
            combo.push(*id);
        }
        self.combos.push(DockFileCombo { nodes: combo });
        Ok(())
    }

    /// Merge is complete; renumber, canonicalize step instances, and
    /// validate. Returns the finalized graph plus one dock-file combination
    /// per added configuration, in addition order.
    pub fn finish(mut self) -> Result<(BuildGraph, Vec<DockFileCombo>), Error> {
        self.graph.finalize()?;
        Ok((self.graph, self.combos))
    }

    fn intern_artifacts(
        &mut self,
        entries: &[(&'static str, ContentHash, String)],
    ) -> Vec<(&'static str, NodeId)> {
        entries
            .iter()
            .map(|(role, h, logical_name)| {
                let id = self.graph.intern_node(h.clone(), || {
                    Node::Artifact(crate::Artifact {
                        logical_name: logical_name.clone(),
                        file_name: logical_name.clone(),
                    })
                });
                (*role, id)
            })
            .collect()
    }
}

/// The step hash is a pure function of (sorted input roles+hashes, step type
/// identity, original directory name, program identity, sorted param
/// roles+hashes, sorted output roles+names). Output *content* never
/// participates: outputs don't exist yet at hash time.
fn compute_step_hash(
    step: &StepDescriptor,
    inputs: &[(&'static str, ContentHash, String)],
    params: &[(&'static str, ContentHash, steps::ParamValue)],
) -> ContentHash {
    let mut sorted_inputs: Vec<(&str, &ContentHash)> =
        inputs.iter().map(|(r, h, _)| (*r, h)).collect();
    sorted_inputs.sort();
    let mut sorted_params: Vec<(&str, &ContentHash)> =
        params.iter().map(|(r, h, _)| (*r, h)).collect();
    sorted_params.sort();
    let mut sorted_outputs: Vec<(&str, &str)> = step
        .outputs
        .iter()
        .map(|o| (o.role, o.logical_name.as_str()))
        .collect();
    sorted_outputs.sort();

    let mut th = TupleHasher::new();
    for (role, h) in sorted_inputs {
        th.push(role).push(h);
    }
    th.push(step.kind.name())
        .push(step.kind.dir_name())
        .push(step.program_file_name());
    for (role, h) in sorted_params {
        th.push(role).push(h);
    }
    for (role, name) in sorted_outputs {
        th.push(role).push(name);
    }
    th.finish()
}
