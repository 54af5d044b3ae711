//! Site-specific producers of [`MetadataRecord`]s.
//!
//! Every extractor crawls one registry, asks the store whether an ontology
//! is already known before downloading anything for it, and pushes the
//! records it could complete into the store. Known-transient failures only
//! cost the current ontology.

pub mod archivo;
pub mod bioportal;
pub mod lov;
pub mod ols;
pub mod sweet;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::cache::Fetcher;
use crate::domain::{ExtractorKind, RdfSyntax};
use crate::error::IndexError;
use crate::graph::Graph;
use crate::rdf::{RdfLoader, sniff_file};
use crate::record::MetadataRecord;
use crate::store::MetadataStore;
use crate::text::is_iso_date;

pub use archivo::DbpediaArchivo;
pub use bioportal::BioPortal;
pub use lov::LinkedOpenVocabularies;
pub use ols::OntologyLookupService;
pub use sweet::SweetOntologies;

pub trait Extractor {
    fn kind(&self) -> ExtractorKind;

    fn source_title(&self) -> &'static str;

    fn source_url(&self) -> &str;

    /// Empty record stamped with this extractor's source.
    fn prepared_record(&self) -> MetadataRecord {
        MetadataRecord::new(self.source_title(), self.source_url())
    }

    fn run(&self, ctx: &mut HarvestContext<'_>) -> Result<ExtractorSummary, IndexError>;
}

/// Builds the extractor for `kind`. BioPortal needs an API key; without one
/// it is left out.
pub fn build(kind: ExtractorKind, bioportal_api_key: Option<&str>) -> Option<Box<dyn Extractor>> {
    match kind {
        ExtractorKind::Archivo => Some(Box::new(DbpediaArchivo::new())),
        ExtractorKind::Lov => Some(Box::new(LinkedOpenVocabularies::new())),
        ExtractorKind::Ols => Some(Box::new(OntologyLookupService::new())),
        ExtractorKind::Bioportal => match bioportal_api_key {
            Some(key) if !key.trim().is_empty() => Some(Box::new(BioPortal::new(key.trim()))),
            _ => {
                warn!("no BioPortal API key configured, BioPortal is skipped");
                None
            }
        },
        ExtractorKind::Sweet => Some(Box::new(SweetOntologies::new())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractorSummary {
    pub source: ExtractorKind,
    pub stored: usize,
    pub known: usize,
    pub skipped: usize,
}

impl ExtractorSummary {
    pub fn new(source: ExtractorKind) -> Self {
        Self {
            source,
            stored: 0,
            known: 0,
            skipped: 0,
        }
    }

    fn count(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Stored => self.stored += 1,
            Outcome::Known => self.known += 1,
            Outcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// What happened to one ontology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stored,
    Known,
    Skipped(String),
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }
}

/// Everything an extractor run may touch.
pub struct HarvestContext<'a> {
    pub store: &'a mut MetadataStore,
    pub fetcher: &'a dyn Fetcher,
    pub rdf: &'a RdfLoader,
    pub sink: &'a dyn ProgressSink,
    /// Scratch space for unpacked archives.
    pub work_dir: &'a Utf8Path,
}

impl<'a> HarvestContext<'a> {
    pub fn narrate(&self, message: impl Into<String>) {
        self.sink.event(ProgressEvent::new(message));
    }

    pub fn is_known(&self, iri: &str) -> Result<bool, IndexError> {
        self.store.has_entry(iri)
    }

    /// Stores one finished record. A record that lost the race against an
    /// earlier source counts as known.
    pub fn store(&mut self, record: MetadataRecord) -> Result<Outcome, IndexError> {
        let summary = self.store.store_entries(std::slice::from_ref(&record))?;
        if summary.inserted == 1 {
            Ok(Outcome::Stored)
        } else {
            Ok(Outcome::Known)
        }
    }

    /// Counts and narrates the result of processing one ontology. Transient
    /// errors are turned into a skip, everything else stops the run.
    pub fn settle(
        &self,
        summary: &mut ExtractorSummary,
        label: &str,
        result: Result<Outcome, IndexError>,
    ) -> Result<(), IndexError> {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) if err.is_transient() => {
                warn!(ontology = label, error = %err, "skipped after transient error");
                Outcome::skipped(err.to_string())
            }
            Err(err) => return Err(err),
        };
        match &outcome {
            Outcome::Stored => self.narrate(format!("{label}: stored")),
            Outcome::Known => self.narrate(format!("{label}: already in index")),
            Outcome::Skipped(reason) => self.narrate(format!("{label}: skipped, {reason}")),
        }
        summary.count(&outcome);
        Ok(())
    }

    pub fn fetch_json<T: DeserializeOwned>(
        &self,
        source_title: &'static str,
        url: &str,
        namespace: Option<&str>,
    ) -> Result<T, IndexError> {
        let body = match namespace {
            Some(namespace) => self.fetcher.fetch_cached(url, namespace)?,
            None => self.fetcher.fetch(url)?,
        };
        serde_json::from_str(&body).map_err(|err| {
            IndexError::extraction(source_title, format!("unexpected JSON from {url}: {err}"))
        })
    }

    /// Downloads `url` once and loads it. `hint` skips format sniffing.
    pub fn load_remote_graph(&self, url: &str, hint: Option<RdfSyntax>) -> Result<Graph, IndexError> {
        let local = self.fetcher.local_file(url)?;
        debug!(url, path = %local, "loading graph");
        self.rdf.load(local.as_std_path(), hint)
    }

    /// Syntax of the file behind `url`, judged by its first bytes.
    pub fn guess_format(&self, url: &str) -> Result<Option<RdfSyntax>, IndexError> {
        let local = self.fetcher.local_file(url)?;
        sniff_file(local.as_std_path())
    }

    pub fn work_path(&self, name: &str) -> Utf8PathBuf {
        self.work_dir.join(name)
    }
}

/// `YYYY-MM-DD` of a timestamp as the registries send them, in UTC.
pub(crate) fn day_of(value: &str) -> Option<String> {
    let value = value.trim();
    let parsed = DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"));
    if let Ok(stamp) = parsed {
        return Some(stamp.with_timezone(&Utc).format("%Y-%m-%d").to_string());
    }
    if is_iso_date(value) {
        return value.get(..10).map(str::to_string);
    }
    None
}
