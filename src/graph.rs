use std::collections::BTreeMap;

use petgraph::graphmap::UnGraphMap;
use serde::Serialize;

pub type NodeId = i64;
pub type GroupId = i64;

/// Nodes come into existence the first time an edge references them.
/// Adding an edge that already exists leaves the graph unchanged.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: UnGraphMap<NodeId, ()>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeId) {
        self.inner.add_node(node);
    }

    pub fn add_edge(&mut self, a: NodeId, b: NodeId) {
        self.inner.add_edge(a, b, ());
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.inner.contains_node(node)
    }

    pub fn contains_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.inner.contains_edge(a, b)
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.nodes()
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.inner.all_edges().map(|(a, b, _)| (a, b))
    }

    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.neighbors(node)
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.inner.neighbors(node).count()
    }

    pub fn as_graphmap(&self) -> &UnGraphMap<NodeId, ()> {
        &self.inner
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelIndex {
    labels: BTreeMap<NodeId, Vec<GroupId>>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: NodeId, group: GroupId) {
        self.labels.entry(node).or_default().push(group);
    }

    pub fn groups(&self, node: NodeId) -> &[GroupId] {
        self.labels.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.labels.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[GroupId])> + '_ {
        self.labels
            .iter()
            .map(|(node, groups)| (*node, groups.as_slice()))
    }

    pub fn distinct_groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self.labels.values().flatten().copied().collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    pub fn into_inner(self) -> BTreeMap<NodeId, Vec<GroupId>> {
        self.labels
    }
}

impl FromIterator<(NodeId, GroupId)> for LabelIndex {
    fn from_iter<T: IntoIterator<Item = (NodeId, GroupId)>>(iter: T) -> Self {
        let mut index = LabelIndex::new();
        for (node, group) in iter {
            index.push(node, group);
        }
        index
    }
}
