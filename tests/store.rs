use camino::Utf8PathBuf;

use ontology_index::domain::{Field, RdfSyntax};
use ontology_index::merge::ManualOverrideMerger;
use ontology_index::output::JsonOutput;
use ontology_index::projector::IndexProjector;
use ontology_index::record::MetadataRecord;
use ontology_index::store::MetadataStore;

fn record(source: &str, iri: &str, title: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new(source, format!("https://{source}.example.org"));
    record.set_title(title);
    record.set_iri(iri).unwrap();
    record
        .set_file(RdfSyntax::NTriples, &format!("{iri}.nt"))
        .unwrap();
    record
}

fn db_path(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join("var").join("index.sqlite")).unwrap()
}

#[test]
fn entries_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir);
    {
        let mut store = MetadataStore::open(&path).unwrap();
        store
            .store_entries(&[record("archivo", "http://example.org/a", "A")])
            .unwrap();
    }

    let mut store = MetadataStore::open(&path).unwrap();
    assert_eq!(store.path(), Some(path.as_path()));
    assert!(store.has_entry("HTTP://EXAMPLE.ORG/A").unwrap());

    let summary = store
        .store_entries(&[record("lov", "http://example.org/A", "Other title")])
        .unwrap();
    assert_eq!((summary.inserted, summary.duplicates), (0, 1));
    let data = store.get_entry_data("http://example.org/a").unwrap().unwrap();
    assert_eq!(data["ontology_title"], "A");
    assert_eq!(data["source_title"], "archivo");
}

#[test]
fn fresh_store_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir);
    {
        let mut store = MetadataStore::open(&path).unwrap();
        store
            .store_entries(&[record("archivo", "http://example.org/a", "A")])
            .unwrap();
    }
    let store = MetadataStore::open_fresh(&path).unwrap();
    assert_eq!(store.count().unwrap(), 0);
    assert!(store.get_entry_data("http://example.org/a").unwrap().is_none());
}

#[test]
fn export_is_stable_between_runs() {
    let mut store = MetadataStore::open_in_memory().unwrap();
    store
        .store_entries(&[
            record("ols", "http://example.org/zeta", "zeta"),
            record("ols", "http://example.org/alpha", "Alpha"),
            record("ols", "http://example.org/beta", "Beta \"quoted\""),
        ])
        .unwrap();

    let projector = IndexProjector::new(&store);
    let first = projector.render_csv().unwrap();
    assert_eq!(first, projector.render_csv().unwrap());
    assert_eq!(
        projector.render_jsonl().unwrap(),
        projector.render_jsonl().unwrap()
    );

    let csv = String::from_utf8(first).unwrap();
    let titles: Vec<&str> = csv
        .lines()
        .skip(1)
        .map(|line| line.split("\",\"").next().unwrap())
        .collect();
    // byte order puts upper case first
    assert_eq!(titles, vec!["\"Alpha", "\"Beta \"\"quoted\"\"", "\"zeta"]);
}

#[test]
fn manual_rows_fill_gaps_of_harvested_entries() {
    let mut store = MetadataStore::open_in_memory().unwrap();
    let mut harvested = record("archivo", "http://example.org/a", "A");
    harvested.set(Field::Summary, "From the registry").unwrap();
    store.store_entries(&[harvested]).unwrap();

    let csv = "title,iri,summary,authors,contributors,license,project page,source page,json-ld,n3,ntriples,rdfxml,turtle,modified,version
A (manual),http://example.org/A,Manual summary,Jane Doe
";
    let summary =
        ManualOverrideMerger::merge_reader(csv.as_bytes(), &mut store, &JsonOutput).unwrap();
    assert_eq!((summary.inserted, summary.updated), (0, 1));

    let entry = store.get_entry("http://example.org/a").unwrap().unwrap();
    assert_eq!(entry.title(), "A");
    assert_eq!(entry.get(Field::Summary), "From the registry");
    assert_eq!(entry.get(Field::Authors), "Jane Doe");
    assert_eq!(entry.get(Field::SourceTitle), "archivo");
}
