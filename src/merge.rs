use std::fs;
use std::io;

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use tracing::{debug, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::Field;
use crate::error::IndexError;
use crate::record::MetadataRecord;
use crate::store::MetadataStore;
use crate::text::{clean_string, is_blank};

pub const MANUAL_SOURCE_TITLE: &str = "Manually maintained";
pub const MANUAL_SOURCE_URL: &str =
    "https://github.com/k00ni/govi/blob/master/manually-maintained-metadata-about-ontologies.csv";
pub const MANUAL_CSV_FILE_NAME: &str = "manually-maintained-metadata-about-ontologies.csv";

/// Column positions of the hand-maintained table.
const COLUMNS: [Field; 15] = [
    Field::OntologyTitle,
    Field::OntologyIri,
    Field::Summary,
    Field::Authors,
    Field::Contributors,
    Field::LicenseInformation,
    Field::ProjectPage,
    Field::SourcePage,
    Field::LatestJsonLdFile,
    Field::LatestN3File,
    Field::LatestNtriplesFile,
    Field::LatestRdfXmlFile,
    Field::LatestTurtleFile,
    Field::Modified,
    Field::Version,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Reconciles the curated override table with the store. Unknown ontologies
/// are inserted; known ones only get their empty columns filled.
pub struct ManualOverrideMerger;

impl ManualOverrideMerger {
    pub fn prepared_record() -> MetadataRecord {
        MetadataRecord::new(MANUAL_SOURCE_TITLE, MANUAL_SOURCE_URL)
    }

    pub fn merge_file(
        path: &Utf8Path,
        store: &mut MetadataStore,
        sink: &dyn ProgressSink,
    ) -> Result<MergeSummary, IndexError> {
        let file = fs::File::open(path.as_std_path())
            .map_err(|err| IndexError::Filesystem(format!("open {path}: {err}")))?;
        Self::merge_reader(file, store, sink)
    }

    /// The first row is a header and is skipped. Short rows are padded with
    /// empty values.
    pub fn merge_reader<R: io::Read>(
        reader: R,
        store: &mut MetadataStore,
        sink: &dyn ProgressSink,
    ) -> Result<MergeSummary, IndexError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut summary = MergeSummary::default();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let iri = row.get(1).unwrap_or_default().trim();
            if is_blank(iri) {
                warn!(line = line + 2, "manual metadata row without ontology IRI skipped");
                summary.skipped += 1;
                continue;
            }

            let record = Self::record_from_row(&row)?;
            match store.get_entry(record.iri())? {
                None => {
                    store.store_entries(std::slice::from_ref(&record))?;
                    sink.event(ProgressEvent::new(format!(
                        "{} ({}): added from manual metadata",
                        record.title(),
                        record.iri()
                    )));
                    summary.inserted += 1;
                }
                Some(existing) => {
                    let existing_source = existing.get(Field::SourceTitle);
                    if existing_source != MANUAL_SOURCE_TITLE {
                        warn!(
                            iri = record.iri(),
                            source = existing_source,
                            "ontology is already provided by another source, manual row may be redundant"
                        );
                    }
                    let outcome = store.update_entry(&record)?;
                    if outcome.is_noop() {
                        debug!(iri = record.iri(), "manual metadata adds nothing new");
                        summary.unchanged += 1;
                    } else {
                        let fields = outcome
                            .changed
                            .iter()
                            .map(|field| field.column())
                            .collect::<Vec<_>>()
                            .join(", ");
                        sink.event(ProgressEvent::new(format!(
                            "{} ({}): filled {fields} from manual metadata",
                            existing.title(),
                            record.iri()
                        )));
                        summary.updated += 1;
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Free-text cells are cleaned like extracted values, so a multi-line
    /// cell still ends up as one index row.
    pub fn record_from_row(row: &StringRecord) -> Result<MetadataRecord, IndexError> {
        let mut record = Self::prepared_record();
        for (idx, field) in COLUMNS.iter().enumerate() {
            let raw = row.get(idx).unwrap_or_default();
            if *field != Field::OntologyIri && is_blank(raw) {
                continue;
            }
            if is_free_text(*field) {
                record.set(*field, &clean_string(raw, false))?;
            } else {
                record.set(*field, raw)?;
            }
        }
        Ok(record)
    }
}

fn is_free_text(field: Field) -> bool {
    matches!(
        field,
        Field::OntologyTitle
            | Field::Summary
            | Field::Authors
            | Field::Contributors
            | Field::LicenseInformation
            | Field::Version
    )
}
