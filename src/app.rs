use std::fs;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::Fetcher;
use crate::domain::ExtractorKind;
use crate::error::IndexError;
use crate::extractors::{self, ExtractorSummary, HarvestContext};
use crate::merge::{ManualOverrideMerger, MergeSummary};
use crate::projector::IndexProjector;
use crate::rdf::RdfLoader;
use crate::store::{MetadataStore, StoredEntry};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn timed(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            elapsed: Some(elapsed),
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Scratch space for unpacked archives.
    pub work_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub manual_metadata_csv: Utf8PathBuf,
    pub bioportal_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub extractors: Vec<ExtractorSummary>,
    pub merge: Option<MergeSummary>,
    pub export: ExportReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub merge: Option<MergeSummary>,
    pub export: ExportReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub rows: usize,
    pub csv_path: String,
    pub jsonl_path: String,
}

/// Drives one run: extractors in order, then the manual merge, then the
/// export. Everything shares one store.
pub struct App<F: Fetcher> {
    store: MetadataStore,
    fetcher: F,
    rdf: RdfLoader,
    settings: AppSettings,
}

impl<F: Fetcher> App<F> {
    pub fn new(store: MetadataStore, fetcher: F, rdf: RdfLoader, settings: AppSettings) -> Self {
        Self {
            store,
            fetcher,
            rdf,
            settings,
        }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn harvest(
        &mut self,
        kinds: &[ExtractorKind],
        sink: &dyn ProgressSink,
    ) -> Result<HarvestReport, IndexError> {
        fs::create_dir_all(self.settings.work_dir.as_std_path()).map_err(|err| {
            IndexError::Filesystem(format!("create {}: {err}", self.settings.work_dir))
        })?;

        let mut summaries = Vec::new();
        for kind in kinds {
            let Some(extractor) =
                extractors::build(*kind, self.settings.bioportal_api_key.as_deref())
            else {
                sink.event(ProgressEvent::new(format!("{kind}: skipped, no API key")));
                continue;
            };

            let start = Instant::now();
            let mut ctx = HarvestContext {
                store: &mut self.store,
                fetcher: &self.fetcher,
                rdf: &self.rdf,
                sink,
                work_dir: &self.settings.work_dir,
            };
            let summary = extractor.run(&mut ctx)?;
            info!(
                source = %kind,
                stored = summary.stored,
                known = summary.known,
                skipped = summary.skipped,
                "extractor finished"
            );
            sink.event(ProgressEvent::timed(
                format!(
                    "{}: {} stored, {} already known, {} skipped",
                    extractor.source_title(),
                    summary.stored,
                    summary.known,
                    summary.skipped
                ),
                start.elapsed(),
            ));
            summaries.push(summary);
        }

        let merge = self.merge_manual(sink)?;
        let export = self.export(sink)?;
        Ok(HarvestReport {
            extractors: summaries,
            merge,
            export,
        })
    }

    /// Manual merge followed by an export, without crawling.
    pub fn merge(&mut self, sink: &dyn ProgressSink) -> Result<MergeReport, IndexError> {
        let merge = self.merge_manual(sink)?;
        let export = self.export(sink)?;
        Ok(MergeReport { merge, export })
    }

    /// `None` when the override table does not exist.
    pub fn merge_manual(
        &mut self,
        sink: &dyn ProgressSink,
    ) -> Result<Option<MergeSummary>, IndexError> {
        let path = &self.settings.manual_metadata_csv;
        if !path.as_std_path().is_file() {
            warn!(path = %path, "manual metadata file not found, merge skipped");
            sink.event(ProgressEvent::new(format!(
                "manual metadata: {path} not found, skipped"
            )));
            return Ok(None);
        }

        let start = Instant::now();
        let summary = ManualOverrideMerger::merge_file(path, &mut self.store, sink)?;
        sink.event(ProgressEvent::timed(
            format!(
                "manual metadata: {} added, {} updated, {} unchanged, {} skipped",
                summary.inserted, summary.updated, summary.unchanged, summary.skipped
            ),
            start.elapsed(),
        ));
        Ok(Some(summary))
    }

    pub fn export(&self, sink: &dyn ProgressSink) -> Result<ExportReport, IndexError> {
        let output_dir = &self.settings.output_dir;
        fs::create_dir_all(output_dir.as_std_path())
            .map_err(|err| IndexError::Filesystem(format!("create {output_dir}: {err}")))?;

        let start = Instant::now();
        let written = IndexProjector::new(&self.store).write_all(output_dir)?;
        sink.event(ProgressEvent::timed(
            format!(
                "{} ontologies written to {} and {}",
                written.rows, written.csv_path, written.jsonl_path
            ),
            start.elapsed(),
        ));
        Ok(ExportReport {
            rows: written.rows,
            csv_path: written.csv_path.to_string(),
            jsonl_path: written.jsonl_path.to_string(),
        })
    }

    pub fn lookup(&self, iri: &str) -> Result<StoredEntry, IndexError> {
        self.store
            .get_entry(iri)?
            .ok_or_else(|| IndexError::NotFound(iri.to_string()))
    }
}
