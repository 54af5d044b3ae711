use std::path::Path;

use tracing::info;

use super::{Extractor, ExtractorSummary, HarvestContext, Outcome};
use crate::domain::{ExtractorKind, Field, RdfSyntax};
use crate::enrich::add_further_metadata;
use crate::error::IndexError;
use crate::fs_util::{extract_zip_fresh, list_files_with_extension, modified_date};
use crate::text::{clean_string, is_blank};

const SOURCE_TITLE: &str = "Sweet Ontologies";
const ARCHIVE_URL: &str = "https://github.com/ESIPFed/sweet/archive/refs/heads/master.zip";
const RAW_BASE_URL: &str = "https://raw.githubusercontent.com/ESIPFed/sweet/master/src/";
const UNPACK_DIR: &str = "sweet";
const UNZIPPED_FOLDER: &str = "sweet-master";

/// Semantic Web for Earth and Environmental Terminology. The whole GitHub
/// repository is downloaded and every Turtle file under `src/` is one
/// ontology.
pub struct SweetOntologies;

impl SweetOntologies {
    pub fn new() -> Self {
        Self
    }

    pub fn turtle_link(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        Some(format!("{RAW_BASE_URL}{name}"))
    }

    fn process(&self, ctx: &mut HarvestContext<'_>, path: &Path) -> Result<Outcome, IndexError> {
        let graph = ctx.rdf.load(path, Some(RdfSyntax::Turtle))?;
        let ontologies = graph.instances_of_type("owl:Ontology");
        let [iri] = ontologies.as_slice() else {
            return Ok(Outcome::skipped(format!(
                "expected exactly one ontology, found {}",
                ontologies.len()
            )));
        };
        if ctx.is_known(iri)? {
            return Ok(Outcome::Known);
        }

        let mut record = self.prepared_record();
        record.set_iri(iri)?;
        add_further_metadata(&mut record, &graph)?;

        let title = graph
            .label(iri, Some("en"))
            .or_else(|| graph.label(iri, None))
            .map(|label| clean_string(label, false))
            .unwrap_or_default();
        if is_blank(&title) {
            return Ok(Outcome::skipped("no title found"));
        }
        record.set_title(&title);

        let Some(link) = Self::turtle_link(path) else {
            return Ok(Outcome::skipped("file name is not valid UTF-8"));
        };
        record.set_file(RdfSyntax::Turtle, &link)?;
        record.set(Field::Modified, &modified_date(path)?)?;
        ctx.store(record)
    }
}

impl Default for SweetOntologies {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for SweetOntologies {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Sweet
    }

    fn source_title(&self) -> &'static str {
        SOURCE_TITLE
    }

    fn source_url(&self) -> &str {
        ARCHIVE_URL
    }

    fn run(&self, ctx: &mut HarvestContext<'_>) -> Result<ExtractorSummary, IndexError> {
        ctx.narrate(format!("{SOURCE_TITLE}: extraction started"));
        let archive = ctx.fetcher.local_file(ARCHIVE_URL)?;
        let target = ctx.work_path(UNPACK_DIR);
        extract_zip_fresh(archive.as_std_path(), target.as_std_path())?;

        let src = target.join(UNZIPPED_FOLDER).join("src");
        if !src.as_std_path().is_dir() {
            return Err(IndexError::extraction(
                SOURCE_TITLE,
                format!("{src} missing in downloaded archive"),
            ));
        }
        let files = list_files_with_extension(src.as_std_path(), "ttl")?;
        info!(count = files.len(), "SWEET files to process");

        let mut summary = ExtractorSummary::new(self.kind());
        for file in &files {
            let label = file
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| file.display().to_string());
            let result = self.process(ctx, file);
            ctx.settle(&mut summary, &label, result)?;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use assert_matches::assert_matches;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::extractors::testing::*;
    use crate::store::MetadataStore;

    const PHENOMENA: &str = r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix dcterms: <http://purl.org/dc/terms/> .
<http://sweetontology.net/phen> a owl:Ontology ;
    rdfs:label "SWEET Ontology Phenomena"@en ;
    dcterms:creator "Rob Raskin" .
"#;

    const TWO_ONTOLOGIES: &str = r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
<http://sweetontology.net/a> a owl:Ontology .
<http://sweetontology.net/b> a owl:Ontology .
"#;

    const UNTITLED: &str = r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
<http://sweetontology.net/untitled> a owl:Ontology .
"#;

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn stores_one_entry_per_ontology_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        let zip = archive(&[
            ("sweet-master/src/phen.ttl", PHENOMENA),
            ("sweet-master/src/two.ttl", TWO_ONTOLOGIES),
            ("sweet-master/src/untitled.ttl", UNTITLED),
            ("sweet-master/README.md", "# SWEET"),
        ]);
        let fetcher = MockFetcher::new(&root.join("cache")).file(ARCHIVE_URL, zip);
        let mut store = MetadataStore::open_in_memory().unwrap();

        let summary =
            run_extractor(&SweetOntologies::new(), &mut store, &fetcher, &root.join("work"))
                .unwrap();
        assert_eq!((summary.stored, summary.known, summary.skipped), (1, 0, 2));

        let entry = store.get_entry("http://sweetontology.net/phen").unwrap().unwrap();
        assert_eq!(entry.title(), "SWEET Ontology Phenomena");
        assert_eq!(entry.get(Field::Authors), "Rob Raskin");
        assert_eq!(
            entry.get(Field::LatestTurtleFile),
            "https://raw.githubusercontent.com/ESIPFed/sweet/master/src/phen.ttl"
        );
        assert_eq!(entry.get(Field::Modified).len(), 10);
    }

    #[test]
    fn archive_without_sources_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        let zip = archive(&[("other/readme.md", "nothing")]);
        let fetcher = MockFetcher::new(&root.join("cache")).file(ARCHIVE_URL, zip);
        let mut store = MetadataStore::open_in_memory().unwrap();
        assert_matches!(
            run_extractor(&SweetOntologies::new(), &mut store, &fetcher, &root.join("work")),
            Err(IndexError::Extraction { .. })
        );
    }
}
