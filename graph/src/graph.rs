use std::collections::BTreeMap;

use hashbrown::HashMap;
use steps::StepDescriptor;
use util::IdVec;

use crate::{Artifact, ContentHash, Error, Node, NodeId, StepId};

/// One dependency edge. Steps connect every input node to every output node
/// (and every param node to every output node), so the absence of any
/// predecessor blocks all of a step's outputs.
#[derive(Debug)]
pub struct Edge {
    pub src: NodeId,
    pub dst: NodeId,
    /// role the source plays on the owning step
    pub src_role: &'static str,
    /// role the destination plays on the owning step
    pub dst_role: &'static str,
    pub step_hash: ContentHash,
    /// canonical owning instance; assigned in the finalize pass
    pub step: Option<StepId>,
}

/// The canonical instance owning one group of edges after the merge:
/// exactly one per distinct step hash, bound to a unique numbered directory.
#[derive(Debug)]
pub struct StepInstance {
    pub hash: ContentHash,
    pub descriptor: StepDescriptor,
    pub dir_name: String,
    pub inputs: Vec<(&'static str, NodeId)>,
    pub outputs: Vec<(&'static str, NodeId)>,
    pub params: Vec<(&'static str, NodeId)>,
}

/// Step bindings recorded during construction, waiting for the merge pass to
/// pick a canonical directory name.
#[derive(Debug)]
pub(crate) struct PendingStep {
    pub descriptor: StepDescriptor,
    pub inputs: Vec<(&'static str, NodeId)>,
    pub outputs: Vec<(&'static str, NodeId)>,
    pub params: Vec<(&'static str, NodeId)>,
}

/// Directed acyclic multigraph over artifact and parameter nodes, merged
/// across all configurations. Node identity IS the content hash, so
/// identical work coalesces as subgraphs are added.
#[derive(Debug, Default)]
pub struct BuildGraph {
    nodes: IdVec<NodeId, Node>,
    hashes: IdVec<NodeId, ContentHash>,
    ids_by_hash: HashMap<ContentHash, NodeId>,
    edges: Vec<Edge>,
    pending: HashMap<ContentHash, PendingStep>,
    steps: IdVec<StepId, StepInstance>,
    steps_by_hash: HashMap<ContentHash, StepId>,
    /// per-node producing step; None = externally supplied input
    producers: Vec<Option<StepId>>,
    /// per-node predecessor lists (deduplicated)
    preds: Vec<Vec<NodeId>>,
    finalized: bool,
}

impl BuildGraph {
    /// Get the id for a node with this hash, creating the node if new.
    pub(crate) fn intern_node(&mut self, hash: ContentHash, node: impl FnOnce() -> Node) -> NodeId {
        if let Some(id) = self.ids_by_hash.get(&hash) {
            return *id;
        }
        let id = self.nodes.push(node());
        self.hashes.push(hash.clone());
        self.ids_by_hash.insert(hash, id);
        id
    }

    pub(crate) fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub(crate) fn record_pending(&mut self, hash: ContentHash, step: PendingStep) {
        self.pending.entry(hash).or_insert(step);
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id)
    }

    pub fn node_hash(&self, id: NodeId) -> &ContentHash {
        self.hashes.get(id)
    }

    pub fn artifact(&self, id: NodeId) -> Option<&Artifact> {
        self.nodes.get(id).as_artifact()
    }

    pub fn step(&self, id: StepId) -> &StepInstance {
        self.steps.get(id)
    }

    pub fn step_instances(&self) -> impl Iterator<Item = (StepId, &StepInstance)> {
        self.steps.iter_ids()
    }

    pub fn producer(&self, id: NodeId) -> Option<StepId> {
        self.producers[usize::from(id)]
    }

    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        &self.preds[usize::from(id)]
    }

    pub fn artifacts(&self) -> impl Iterator<Item = (NodeId, &Artifact)> {
        self.nodes
            .iter_ids()
            .filter_map(|(id, n)| n.as_artifact().map(|a| (id, a)))
    }
}

// the finalize pass /////////////////
impl BuildGraph {
    /// Run once after every configuration's subgraph has been added:
    /// assigns deterministic physical file names, collapses each step-hash
    /// edge group to one canonical instance, and validates acyclicity.
    pub(crate) fn finalize(&mut self) -> Result<(), Error> {
        debug_assert!(!self.finalized);
        self.renumber_artifacts();
        self.canonicalize_steps()?;
        self.build_predecessor_lists();
        self.check_acyclic()?;
        self.finalized = true;
        log::debug!(
            "finalized graph with {} nodes, {} step instances, {} edges",
            self.nodes.len(),
            self.steps.len(),
            self.edges.len(),
        );
        Ok(())
    }

    /// Append `_1`, `_2`, ... to artifact file names, grouped by logical
    /// name, in lexicographic node-hash order. Iteration order during
    /// construction has no effect on the result.
    fn renumber_artifacts(&mut self) {
        let mut groups: BTreeMap<String, Vec<(ContentHash, NodeId)>> = BTreeMap::new();
        for (id, node) in self.nodes.iter_ids() {
            if let Node::Artifact(a) = node {
                groups
                    .entry(a.logical_name.clone())
                    .or_default()
                    .push((self.hashes.get(id).clone(), id));
            }
        }
        for (logical_name, mut group) in groups {
            group.sort();
            for (i, (_, id)) in group.into_iter().enumerate() {
                if let Node::Artifact(a) = self.nodes.get_mut(id) {
                    a.file_name = format!("{}_{}", logical_name, i + 1);
                }
            }
        }
    }

    /// One instance per step hash, visiting hashes in sorted order so that
    /// directory numbering is deterministic; then repoint all edges in the
    /// group to the canonical instance.
    fn canonicalize_steps(&mut self) -> Result<(), Error> {
        let mut step_hashes: Vec<ContentHash> = self.pending.keys().cloned().collect();
        step_hashes.sort();

        let mut dir_counts: util::HashMap<&'static str, usize> = util::HashMap::default();
        for hash in step_hashes {
            let pending = self.pending.remove(&hash).expect("pending step exists");
            let original_dir = pending.descriptor.kind.dir_name();
            let count = dir_counts.entry(original_dir).or_insert(0);
            *count += 1;

            let instance = StepInstance {
                hash: hash.clone(),
                dir_name: format!("{original_dir}_{count}"),
                descriptor: pending.descriptor,
                inputs: pending.inputs,
                outputs: pending.outputs,
                params: pending.params,
            };

            let id = self.steps.push(instance);
            self.steps_by_hash.insert(hash, id);
        }

        // producers: every artifact has at most one owning step.
        self.producers = vec![None; self.nodes.len()];
        for (id, instance) in self.steps.iter_ids() {
            for (_, node) in &instance.outputs {
                let slot = &mut self.producers[usize::from(*node)];
                match slot {
                    Some(existing) if *existing != id => {
                        let name = self.nodes.get(*node).describe().to_owned();
                        return Err(Error::MultipleProducers(name));
                    }
                    _ => *slot = Some(id),
                }
            }
        }

        for edge in &mut self.edges {
            edge.step = self.steps_by_hash.get(&edge.step_hash).copied();
        }
        Ok(())
    }

    fn build_predecessor_lists(&mut self) {
        self.preds = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            let list = &mut self.preds[usize::from(edge.dst)];
            if !list.contains(&edge.src) {
                list.push(edge.src);
            }
        }
    }

    /// Kahn's algorithm; a cycle here means the step catalog wired an output
    /// back into an ancestor and is an unrecoverable configuration error.
    fn check_acyclic(&self) -> Result<(), Error> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in &self.edges {
            indegree[usize::from(edge.dst)] += 1;
            succs[usize::from(edge.src)].push(usize::from(edge.dst));
        }

        let mut queue: Vec<usize> = (0..n).filter(|i| indegree[*i] == 0).collect();
        let mut processed = 0;
        while let Some(i) = queue.pop() {
            processed += 1;
            for &succ in &succs[i] {
                indegree[succ] -= 1;
                if indegree[succ] == 0 {
                    queue.push(succ);
                }
            }
        }

        if processed < n {
            let stuck = (0..n)
                .find(|i| indegree[*i] > 0)
                .expect("some node remains in the cycle");
            let name = self.nodes.get(NodeId::from(stuck)).describe().to_owned();
            return Err(Error::CycleDetected(name));
        }
        Ok(())
    }
}
