use std::io::{self, Write};

use serde::Serialize;

use crate::graph::{Graph, LabelIndex};

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractResult {
    pub archive: String,
    pub destination: String,
    pub extracted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub dataset: String,
    pub nodes: usize,
    pub edges: usize,
    pub labelled_nodes: usize,
    pub unlabelled_nodes: usize,
    pub groups: usize,
}

impl LoadResult {
    pub fn summarize(dataset: &str, graph: &Graph, labels: &LabelIndex) -> Self {
        let unlabelled_nodes = graph
            .nodes()
            .filter(|node| !labels.contains_node(*node))
            .count();
        Self {
            dataset: dataset.to_string(),
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            labelled_nodes: labels.len(),
            unlabelled_nodes,
            groups: labels.distinct_groups().len(),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_extract(result: &ExtractResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_load(result: &LoadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_unlabelled_nodes() {
        let mut graph = Graph::new();
        graph.add_edge(1, 2);
        graph.add_edge(2, 3);
        let labels: LabelIndex = [(1, 10), (1, 20), (2, 10)].into_iter().collect();

        let summary = LoadResult::summarize("toy", &graph, &labels);
        assert_eq!(summary.nodes, 3);
        assert_eq!(summary.edges, 2);
        assert_eq!(summary.labelled_nodes, 2);
        assert_eq!(summary.unlabelled_nodes, 1);
        assert_eq!(summary.groups, 2);
    }
}
