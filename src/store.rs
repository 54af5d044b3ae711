use std::collections::BTreeMap;
use std::fs;
use std::iter;

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, info};

use crate::domain::{Field, OntologyIri};
use crate::error::IndexError;
use crate::record::MetadataRecord;
use crate::text::is_blank;

const TABLE: &str = "entry";

/// Keyed table of ontology metadata backed by a single SQLite file.
///
/// Rows are unique on the case-folded IRI. The first record stored for an
/// ontology owns the row; later passes can only fill columns that are still
/// empty (see [`MetadataStore::update_entry`]).
pub struct MetadataStore {
    conn: Connection,
    path: Option<Utf8PathBuf>,
}

/// A persisted row, including its surrogate id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub id: i64,
    values: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub changed: Vec<Field>,
}

impl UpdateOutcome {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

impl MetadataStore {
    /// Opens (or creates) the database file, keeping rows from earlier runs.
    pub fn open(path: &Utf8Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| IndexError::Filesystem(err.to_string()))?;
            }
        }
        let conn = Connection::open(path.as_std_path())?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        debug!(path = %path, "opened metadata store");
        Ok(store)
    }

    /// Removes a previous database file first, so the run starts empty.
    pub fn open_fresh(path: &Utf8Path) -> Result<Self, IndexError> {
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path())
                .map_err(|err| IndexError::Filesystem(err.to_string()))?;
            info!(path = %path, "removed previous metadata store");
        }
        Self::open(path)
    }

    pub fn open_in_memory() -> Result<Self, IndexError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<(), IndexError> {
        let columns = Field::ALL
            .iter()
            .map(|field| format!("    {} TEXT NOT NULL DEFAULT ''", field.column()))
            .collect::<Vec<_>>()
            .join(",\n");
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {TABLE} (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    ontology_key TEXT NOT NULL UNIQUE,\n{columns}\n);"
        );
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    /// Case-insensitive existence check. Extractors call this before any
    /// download or parse.
    pub fn has_entry(&self, iri: &str) -> Result<bool, IndexError> {
        let key = OntologyIri::normalize(iri);
        let found: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {TABLE} WHERE ontology_key = ?1)"),
            [key.as_str()],
            |row| row.get(0),
        )?;
        Ok(found != 0)
    }

    pub fn get_entry(&self, iri: &str) -> Result<Option<StoredEntry>, IndexError> {
        let key = OntologyIri::normalize(iri);
        let sql = format!("SELECT {} FROM {TABLE} WHERE ontology_key = ?1", select_list());
        let entry = self
            .conn
            .query_row(&sql, [key.as_str()], read_entry)
            .optional()?;
        Ok(entry)
    }

    /// The stored row as a column-keyed map, or `None` if the IRI is unknown.
    pub fn get_entry_data(&self, iri: &str) -> Result<Option<BTreeMap<String, String>>, IndexError> {
        Ok(self.get_entry(iri)?.map(|entry| entry.to_map()))
    }

    /// Inserts every record. Records whose IRI is already stored are ignored
    /// and the existing row is kept as it is.
    ///
    /// The whole batch is validated before anything is written, so an
    /// invalid record aborts the call without a partial insert.
    pub fn store_entries(&mut self, records: &[MetadataRecord]) -> Result<StoreSummary, IndexError> {
        for record in records {
            record.validate()?;
        }

        let column_list = Field::ALL
            .iter()
            .map(|field| field.column())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=Field::ALL.len() + 1)
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO {TABLE} (ontology_key, {column_list}) VALUES ({placeholders})");

        let mut summary = StoreSummary::default();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let key = record.key();
                let values = iter::once(key.as_str())
                    .chain(Field::ALL.iter().map(|field| record.get(*field)));
                match stmt.execute(params_from_iter(values)) {
                    Ok(_) => summary.inserted += 1,
                    Err(err) if is_unique_violation(&err) => {
                        debug!(iri = record.iri(), "entry already stored, insert ignored");
                        summary.duplicates += 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        tx.commit()?;
        Ok(summary)
    }

    /// Fills columns of the stored row that are still empty.
    ///
    /// A column is written only if the incoming value differs from the
    /// stored one and the stored one is empty. Populated columns are never
    /// overwritten. The IRI and the source columns are not updatable.
    pub fn update_entry(&mut self, record: &MetadataRecord) -> Result<UpdateOutcome, IndexError> {
        let stored = self
            .get_entry(record.iri())?
            .ok_or_else(|| IndexError::NotFound(record.iri().to_string()))?;

        let changed: Vec<Field> = Field::UPDATABLE
            .into_iter()
            .filter(|field| {
                let incoming = record.get(*field);
                let current = stored.get(*field);
                incoming != current && is_blank(current) && !is_blank(incoming)
            })
            .collect();
        if changed.is_empty() {
            return Ok(UpdateOutcome::default());
        }

        let assignments = changed
            .iter()
            .enumerate()
            .map(|(idx, field)| format!("{} = ?{}", field.column(), idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {TABLE} SET {assignments} WHERE id = ?{}",
            changed.len() + 1
        );
        let values = changed
            .iter()
            .map(|field| Value::Text(record.get(*field).to_string()))
            .chain(iter::once(Value::Integer(stored.id)));
        self.conn.execute(&sql, params_from_iter(values))?;
        debug!(iri = record.iri(), fields = ?changed, "filled empty columns");
        Ok(UpdateOutcome { changed })
    }

    /// Every row, ordered by title (byte order) and then by insertion.
    pub fn all_entries(&self) -> Result<Vec<StoredEntry>, IndexError> {
        let sql = format!(
            "SELECT {} FROM {TABLE} ORDER BY ontology_title ASC, id ASC",
            select_list()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl StoredEntry {
    pub fn get(&self, field: Field) -> &str {
        self.values
            .get(field as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn iri(&self) -> &str {
        self.get(Field::OntologyIri)
    }

    pub fn title(&self) -> &str {
        self.get(Field::OntologyTitle)
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        Field::ALL
            .iter()
            .map(|field| (field.column().to_string(), self.get(*field).to_string()))
            .collect()
    }
}

/// Serializes as an object with one key per column, in projection order.
impl Serialize for StoredEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Field::ALL.len()))?;
        for field in Field::ALL {
            map.serialize_entry(field.column(), self.get(field))?;
        }
        map.end()
    }
}

fn select_list() -> String {
    iter::once("id")
        .chain(Field::ALL.iter().map(|field| field.column()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_entry(row: &Row<'_>) -> rusqlite::Result<StoredEntry> {
    let id = row.get(0)?;
    let mut values = Vec::with_capacity(Field::ALL.len());
    for idx in 0..Field::ALL.len() {
        values.push(row.get::<_, String>(idx + 1)?);
    }
    Ok(StoredEntry { id, values })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
