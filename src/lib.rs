//! Fetch graph-learning datasets into a local cache, extract them and parse
//! them into a [`graph::Graph`] plus a [`graph::LabelIndex`].
//!
//! ```no_run
//! use graph_datasets::cache::{CacheConfig, FileCache};
//! use graph_datasets::dataset::{DatasetLoader, DatasetSpec};
//! use graph_datasets::fetch::HttpFetcher;
//!
//! let cache = FileCache::new(CacheConfig::default_for_cwd()?, HttpFetcher::new()?);
//! let loader = DatasetLoader::new(cache, DatasetSpec::blogcatalog());
//! let (graph, labels) = loader.load_graph()?;
//! println!("{} nodes, {} labelled", graph.node_count(), labels.len());
//! # Ok::<(), graph_datasets::error::DatasetError>(())
//! ```

pub mod archive;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod output;
