use camino::{Utf8Path, Utf8PathBuf};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::info;

use crate::domain::Field;
use crate::error::IndexError;
use crate::fs_util::write_bytes_atomic;
use crate::store::{MetadataStore, StoredEntry};

pub const CSV_FILE_NAME: &str = "index.csv";
pub const JSONL_FILE_NAME: &str = "index.jsonl";

/// Read-only export of the store into `index.csv` and `index.jsonl`.
///
/// Both renderings are a pure function of the stored rows, so exporting
/// twice without writes in between produces the same bytes.
pub struct IndexProjector<'a> {
    store: &'a MetadataStore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub rows: usize,
    pub csv_path: Utf8PathBuf,
    pub jsonl_path: Utf8PathBuf,
}

impl<'a> IndexProjector<'a> {
    pub fn new(store: &'a MetadataStore) -> Self {
        Self { store }
    }

    /// Header row plus one line per entry. Every value is quoted; embedded
    /// quotes are doubled.
    pub fn render_csv(&self) -> Result<Vec<u8>, IndexError> {
        render_csv(&self.store.all_entries()?)
    }

    pub fn render_jsonl(&self) -> Result<Vec<u8>, IndexError> {
        render_jsonl(&self.store.all_entries()?)
    }

    /// Writes both files into `output_dir`, replacing earlier exports.
    pub fn write_all(&self, output_dir: &Utf8Path) -> Result<ProjectionSummary, IndexError> {
        let entries = self.store.all_entries()?;
        let csv_path = output_dir.join(CSV_FILE_NAME);
        let jsonl_path = output_dir.join(JSONL_FILE_NAME);
        write_bytes_atomic(&csv_path, &render_csv(&entries)?)?;
        write_bytes_atomic(&jsonl_path, &render_jsonl(&entries)?)?;
        info!(rows = entries.len(), dir = %output_dir, "index written");
        Ok(ProjectionSummary {
            rows: entries.len(),
            csv_path,
            jsonl_path,
        })
    }
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn render_csv(entries: &[StoredEntry]) -> Result<Vec<u8>, IndexError> {
    let mut writer = csv_writer();
    writer.write_record(Field::ALL.iter().map(|field| field.label()))?;
    for entry in entries {
        writer.write_record(Field::ALL.iter().map(|field| entry.get(*field)))?;
    }
    writer
        .into_inner()
        .map_err(|err| IndexError::Csv(err.to_string()))
}

fn render_jsonl(entries: &[StoredEntry]) -> Result<Vec<u8>, IndexError> {
    let mut out = Vec::new();
    for entry in entries {
        serde_json::to_writer(&mut out, entry)
            .map_err(|err| IndexError::Filesystem(err.to_string()))?;
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MetadataRecord;

    fn store_with(titles: &[(&str, &str)]) -> MetadataStore {
        let mut store = MetadataStore::open_in_memory().unwrap();
        let records: Vec<MetadataRecord> = titles
            .iter()
            .map(|(iri, title)| {
                let mut record = MetadataRecord::new("Test source", "https://example.org/source");
                record.set_title(title);
                record.set_iri(iri).unwrap();
                record
                    .set(Field::LatestTurtleFile, "http://f/1.ttl")
                    .unwrap();
                record
            })
            .collect();
        store.store_entries(&records).unwrap();
        store
    }

    #[test]
    fn csv_header_and_order() {
        let store = store_with(&[("http://onto/z", "Zeta"), ("http://onto/a", "Alpha")]);
        let csv = String::from_utf8(IndexProjector::new(&store).render_csv().unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("\"ontology title\",\"ontology iri\",\"summary\""));
        assert!(lines[0].ends_with("\"modified\",\"version\",\"source title\",\"source url\""));
        assert!(lines[1].starts_with("\"Alpha\",\"http://onto/a\""));
        assert!(lines[2].starts_with("\"Zeta\",\"http://onto/z\""));
    }

    #[test]
    fn every_value_is_quoted() {
        let store = store_with(&[("http://onto/a", "Alpha")]);
        let csv = String::from_utf8(IndexProjector::new(&store).render_csv().unwrap()).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row.matches("\",\"").count(), Field::ALL.len() - 1);
        assert!(row.contains("\"\",\"\""));
    }

    #[test]
    fn jsonl_one_object_per_line() {
        let store = store_with(&[("http://onto/z", "Zeta"), ("http://onto/a", "Alpha")]);
        let jsonl =
            String::from_utf8(IndexProjector::new(&store).render_jsonl().unwrap()).unwrap();
        let rows: Vec<serde_json::Value> = jsonl
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ontology_title"], "Alpha");
        assert_eq!(rows[1]["latest_turtle_file"], "http://f/1.ttl");
        assert_eq!(rows[0].as_object().unwrap().len(), Field::ALL.len());
    }

    #[test]
    fn rendering_is_stable() {
        let store = store_with(&[("http://onto/b", "B"), ("http://onto/a", "A")]);
        let projector = IndexProjector::new(&store);
        assert_eq!(projector.render_csv().unwrap(), projector.render_csv().unwrap());
        assert_eq!(projector.render_jsonl().unwrap(), projector.render_jsonl().unwrap());
    }

    #[test]
    fn writer_errors_are_csv_errors() {
        let mut writer = csv_writer();
        writer.write_record(["a", "b"]).unwrap();
        let err: IndexError = writer.write_record(["only one"]).unwrap_err().into();
        assert!(matches!(err, IndexError::Csv(_)));
        assert!(err.to_string().starts_with("CSV error"));
    }
}
