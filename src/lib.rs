pub mod app;
pub mod cache;
pub mod config;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod extractors;
pub mod fs_util;
pub mod graph;
pub mod merge;
pub mod output;
pub mod projector;
pub mod rdf;
pub mod record;
pub mod store;
pub mod text;
