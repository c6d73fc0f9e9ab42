use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use graph_datasets::cache::{CacheConfig, FileCache};
use graph_datasets::dataset::{DatasetLoader, DatasetSpec, parse_edge_list, parse_labels};
use graph_datasets::error::DatasetError;
use graph_datasets::fetch::Fetcher;

#[derive(Default)]
struct ArchiveServer {
    body: Vec<u8>,
    urls: Mutex<Vec<String>>,
}

impl Fetcher for ArchiveServer {
    fn download(&self, url: &str, destination: &Path) -> Result<(), DatasetError> {
        self.urls.lock().unwrap().push(url.to_string());
        fs::write(destination, &self.body).map_err(|err| DatasetError::Filesystem(err.to_string()))
    }
}

fn blogcatalog_zip(edges: &[u8], groups: &[u8]) -> Vec<u8> {
    let options = zip::write::SimpleFileOptions::default();
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .add_directory("BlogCatalog-dataset/data/", options)
        .unwrap();
    writer
        .start_file("BlogCatalog-dataset/data/edges.csv", options)
        .unwrap();
    writer.write_all(edges).unwrap();
    writer
        .start_file("BlogCatalog-dataset/data/group-edges.csv", options)
        .unwrap();
    writer.write_all(groups).unwrap();
    writer
        .start_file("BlogCatalog-dataset/data/nodes.csv", options)
        .unwrap();
    writer.write_all(b"1\n2\n3\n4\n").unwrap();
    writer.finish().unwrap().into_inner()
}

fn loader<'a>(
    temp: &tempfile::TempDir,
    server: &'a ArchiveServer,
) -> DatasetLoader<&'a ArchiveServer> {
    let root = Utf8PathBuf::from_path_buf(temp.path().join(".cache")).unwrap();
    let cache = FileCache::new(CacheConfig::new(root).unwrap(), server);
    DatasetLoader::new(cache, DatasetSpec::blogcatalog())
}

#[test]
fn edge_list_builds_undirected_graph() {
    let graph = parse_edge_list(&b"1,2\n2,3\n1,3\n"[..], "edges.csv").unwrap();

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 3);
    for (a, b) in [(1, 2), (2, 3), (1, 3)] {
        assert!(graph.contains_edge(a, b));
        assert!(graph.contains_edge(b, a));
    }
}

#[test]
fn duplicate_edges_collapse() {
    let graph = parse_edge_list(&b"1,2\n1,2\n"[..], "edges.csv").unwrap();

    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    assert!(graph.contains_edge(1, 2));
}

#[test]
fn edge_list_skips_blank_lines_and_comments() {
    let graph = parse_edge_list(&b"# header\n\n1,2 # inline\r\n\n"[..], "edges.csv").unwrap();

    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn edge_list_rejects_non_integer_ids() {
    let err = parse_edge_list(&b"1,2\n2,x\n"[..], "edges.csv").unwrap_err();

    assert_matches!(err, DatasetError::Parse { line: 2, .. });
}

#[test]
fn negative_ids_are_integers_too() {
    let graph = parse_edge_list(&b"-1,2\n"[..], "edges.csv").unwrap();
    let labels = parse_labels(&b"-1,-10\n"[..], "group-edges.csv").unwrap();

    assert!(graph.contains_edge(2, -1));
    assert_eq!(labels.groups(-1), &[-10]);
}

#[test]
fn labels_append_in_file_order() {
    let labels = parse_labels(&b"1,10\n1,20\n2,10\n"[..], "group-edges.csv").unwrap();

    assert_eq!(labels.len(), 2);
    assert_eq!(labels.groups(1), &[10, 20]);
    assert_eq!(labels.groups(2), &[10]);
    assert!(labels.groups(3).is_empty());
}

#[test]
fn malformed_label_line_is_fatal() {
    let err = parse_labels(&b"1-10\n"[..], "group-edges.csv").unwrap_err();

    assert_matches!(
        err,
        DatasetError::Parse { ref source_name, line: 1, .. } if source_name == "group-edges.csv"
    );
}

#[test]
fn label_lines_are_never_skipped() {
    assert!(parse_labels(&b"1,10\n\n2,10\n"[..], "group-edges.csv").is_err());
    assert!(parse_labels(&b"1,10,3\n"[..], "group-edges.csv").is_err());
    assert!(parse_labels(&b"1,ten\n"[..], "group-edges.csv").is_err());
}

#[test]
fn load_graph_downloads_extracts_and_parses() {
    let temp = tempfile::tempdir().unwrap();
    let server = ArchiveServer {
        body: blogcatalog_zip(b"1,2\n2,3\n1,3\n3,4\n", b"1,10\n1,20\n2,10\n"),
        ..Default::default()
    };
    let loader = loader(&temp, &server);

    let (graph, labels) = loader.load_graph().unwrap();

    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 4);
    assert_eq!(labels.groups(1), &[10, 20]);
    assert_eq!(labels.groups(2), &[10]);
    assert!(!labels.contains_node(4));
    assert_eq!(
        *server.urls.lock().unwrap(),
        vec![DatasetSpec::blogcatalog().origin]
    );
    assert!(
        temp.path()
            .join(".cache/BlogCatalog-dataset.zip")
            .is_file()
    );
}

#[test]
fn load_graph_reuses_cached_archive() {
    let temp = tempfile::tempdir().unwrap();
    let server = ArchiveServer {
        body: blogcatalog_zip(b"1,2\n", b"1,10\n"),
        ..Default::default()
    };
    let loader = loader(&temp, &server);

    let (first, _) = loader.load_graph().unwrap();
    let (second, _) = loader.load_graph().unwrap();

    assert_eq!(first.edge_count(), second.edge_count());
    assert_eq!(server.urls.lock().unwrap().len(), 1);
}

#[test]
fn load_graph_surfaces_malformed_labels() {
    let temp = tempfile::tempdir().unwrap();
    let server = ArchiveServer {
        body: blogcatalog_zip(b"1,2\n", b"1,10\n1-10\n"),
        ..Default::default()
    };

    let err = loader(&temp, &server).load_graph().unwrap_err();

    assert_matches!(err, DatasetError::Parse { line: 2, .. });
}
