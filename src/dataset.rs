use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{FileCache, ResourceRequest};
use crate::domain::{ArchiveFormat, ResourceName};
use crate::error::DatasetError;
use crate::fetch::Fetcher;
use crate::graph::{Graph, GroupId, LabelIndex, NodeId};

pub const BLOGCATALOG_NAME: &str = "BlogCatalog-dataset";
pub const BLOGCATALOG_ORIGIN: &str =
    "http://socialcomputing.asu.edu/uploads/1283153973/BlogCatalog-dataset.zip";
pub const BLOGCATALOG_EDGES: &str = "data/edges.csv";
pub const BLOGCATALOG_LABELS: &str = "data/group-edges.csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: ResourceName,
    pub origin: String,
    #[serde(default = "default_archive_format")]
    pub archive_format: ArchiveFormat,
    pub edges: Utf8PathBuf,
    pub labels: Utf8PathBuf,
}

fn default_archive_format() -> ArchiveFormat {
    ArchiveFormat::Zip
}

impl DatasetSpec {
    pub fn blogcatalog() -> Self {
        Self {
            name: ResourceName::from_static(BLOGCATALOG_NAME),
            origin: BLOGCATALOG_ORIGIN.to_string(),
            archive_format: ArchiveFormat::Zip,
            edges: Utf8PathBuf::from(BLOGCATALOG_EDGES),
            labels: Utf8PathBuf::from(BLOGCATALOG_LABELS),
        }
    }

    pub fn request(&self) -> ResourceRequest {
        ResourceRequest::new(self.name.clone(), self.origin.clone()).extracted(self.archive_format)
    }
}

pub struct DatasetLoader<F: Fetcher> {
    cache: FileCache<F>,
    spec: DatasetSpec,
}

impl<F: Fetcher> DatasetLoader<F> {
    pub fn new(cache: FileCache<F>, spec: DatasetSpec) -> Self {
        Self { cache, spec }
    }

    pub fn spec(&self) -> &DatasetSpec {
        &self.spec
    }

    /// Nodes that only appear in the label file are not added to the graph.
    pub fn load_graph(&self) -> Result<(Graph, LabelIndex), DatasetError> {
        let root = self.cache.resolve(&self.spec.request())?;
        let edges_path = root.join(&self.spec.edges);
        let labels_path = root.join(&self.spec.labels);

        let graph = read_edge_list(&edges_path)?;
        let labels = read_labels(&labels_path)?;
        debug!(
            dataset = %self.spec.name,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            labelled = labels.len(),
            "dataset loaded"
        );
        Ok((graph, labels))
    }
}

pub fn read_edge_list(path: &Utf8Path) -> Result<Graph, DatasetError> {
    parse_edge_list(open(path)?, path.as_str())
}

pub fn read_labels(path: &Utf8Path) -> Result<LabelIndex, DatasetError> {
    parse_labels(open(path)?, path.as_str())
}

fn open(path: &Utf8Path) -> Result<BufReader<File>, DatasetError> {
    File::open(path.as_std_path())
        .map(BufReader::new)
        .map_err(|err| DatasetError::Filesystem(format!("open {path}: {err}")))
}

/// Blank lines and `#` comments are skipped. Anything else must be exactly
/// two integer ids.
pub fn parse_edge_list<R: BufRead>(reader: R, source_name: &str) -> Result<Graph, DatasetError> {
    let mut graph = Graph::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| DatasetError::Filesystem(format!("{source_name}: {err}")))?;
        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let (a, b) = parse_pair(content)
            .map_err(|message| parse_error(source_name, idx, message))?;
        graph.add_edge(a, b);
    }
    Ok(graph)
}

/// Parses `node_id,group_id` lines. Every line must match; nothing is
/// skipped.
pub fn parse_labels<R: BufRead>(
    reader: R,
    source_name: &str,
) -> Result<LabelIndex, DatasetError> {
    let mut labels = LabelIndex::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| DatasetError::Filesystem(format!("{source_name}: {err}")))?;
        let (node, group): (NodeId, GroupId) =
            parse_pair(&line).map_err(|message| parse_error(source_name, idx, message))?;
        labels.push(node, group);
    }
    Ok(labels)
}

fn parse_pair(line: &str) -> Result<(i64, i64), String> {
    let fields: Vec<&str> = line.split(',').collect();
    let [first, second] = fields.as_slice() else {
        return Err(format!(
            "expected 2 comma-separated fields, found {}: {line:?}",
            fields.len()
        ));
    };
    Ok((parse_id(first)?, parse_id(second)?))
}

fn parse_id(field: &str) -> Result<i64, String> {
    let field = field.trim();
    field
        .parse()
        .map_err(|err| format!("invalid integer id {field:?}: {err}"))
}

fn parse_error(source_name: &str, idx: usize, message: String) -> DatasetError {
    DatasetError::Parse {
        source_name: source_name.to_string(),
        line: idx + 1,
        message,
    }
}
