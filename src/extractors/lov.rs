use serde::Deserialize;
use tracing::info;

use super::{Extractor, ExtractorSummary, HarvestContext, Outcome};
use crate::domain::{ExtractorKind, RdfSyntax};
use crate::enrich::{add_further_metadata, contains_ontology_elements};
use crate::error::IndexError;
use crate::fs_util::gunzip;
use crate::graph::Graph;
use crate::text::{clean_string, is_blank, is_url};

const SOURCE_TITLE: &str = "Linked Open Vocabularies";
const VOCABULARY_LIST_URL: &str = "https://lov.linkeddata.es/dataset/lov/api/v2/vocabulary/list";
const DUMP_URL: &str = "https://lov.linkeddata.es/lov.n3.gz";
const DUMP_FILE_NAME: &str = "lov.n3";

#[derive(Debug, Deserialize)]
struct LovVocabulary {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    titles: Vec<LovTitle>,
}

#[derive(Debug, Deserialize)]
struct LovTitle {
    #[serde(default)]
    value: Option<String>,
}

/// Vocabulary as announced by the LOV API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub title: String,
    pub iri: String,
}

/// Reads the LOV vocabulary list, then completes every vocabulary from the
/// LOV dump and its latest N3 distribution.
pub struct LinkedOpenVocabularies;

impl LinkedOpenVocabularies {
    pub fn new() -> Self {
        Self
    }

    /// Only the first title is used.
    pub fn parse_vocabularies(json: &str) -> Result<Vec<Vocabulary>, IndexError> {
        let raw: Vec<LovVocabulary> = serde_json::from_str(json).map_err(|err| {
            IndexError::extraction(SOURCE_TITLE, format!("unexpected vocabulary list: {err}"))
        })?;
        Ok(raw
            .into_iter()
            .filter_map(|vocabulary| {
                let iri = vocabulary.uri.filter(|uri| !is_blank(uri))?;
                let title = vocabulary
                    .titles
                    .into_iter()
                    .find_map(|title| title.value)
                    .map(|title| clean_string(&title, false))
                    .unwrap_or_default();
                Some(Vocabulary { title, iri })
            })
            .collect())
    }

    /// Non-blank `dcat:distribution` values, newest (lexically greatest) first.
    pub fn distributions(dump: &Graph, iri: &str) -> Vec<String> {
        let mut files: Vec<String> = dump
            .property_objects(iri, "dcat:distribution", None)
            .into_iter()
            .filter(|term| !term.is_blank_node())
            .map(|term| term.value().to_string())
            .collect();
        files.sort_by(|a, b| b.cmp(a));
        files
    }

    fn load_dump(&self, ctx: &HarvestContext<'_>) -> Result<Graph, IndexError> {
        let archive = ctx.fetcher.local_file(DUMP_URL)?;
        let target = ctx.work_path(DUMP_FILE_NAME);
        gunzip(&archive, &target)?;
        ctx.narrate(format!("{DUMP_URL} downloaded and uncompressed to {target}"));
        // the dump is read completely, it is the only metadata source for
        // many vocabularies
        ctx.rdf
            .with_max_triples(usize::MAX)
            .load(target.as_std_path(), Some(RdfSyntax::Turtle))
    }

    fn process(
        &self,
        ctx: &mut HarvestContext<'_>,
        dump: &Graph,
        vocabulary: &Vocabulary,
    ) -> Result<Outcome, IndexError> {
        if ctx.is_known(&vocabulary.iri)? {
            return Ok(Outcome::Known);
        }
        let mut record = self.prepared_record();
        record.set_title(&vocabulary.title).set_iri(&vocabulary.iri)?;
        add_further_metadata(&mut record, dump)?;

        let Some(n3_file) = Self::distributions(dump, &vocabulary.iri)
            .into_iter()
            .find(|file| is_url(file))
        else {
            return Ok(Outcome::skipped("no N3 distribution found"));
        };
        record.set_file(RdfSyntax::N3, &n3_file)?;

        let graph = ctx.load_remote_graph(&n3_file, Some(RdfSyntax::N3))?;
        add_further_metadata(&mut record, &graph)?;
        if !contains_ontology_elements(&graph) {
            return Ok(Outcome::skipped(format!(
                "{n3_file} does not contain any ontology elements"
            )));
        }
        if is_blank(record.title()) {
            let label = dump
                .label(&vocabulary.iri, Some("en"))
                .or_else(|| graph.label(&vocabulary.iri, None))
                .map(|label| clean_string(label, false));
            match label {
                Some(label) if !is_blank(&label) => {
                    record.set_title(&label);
                }
                _ => return Ok(Outcome::skipped("no title found")),
            }
        }
        ctx.store(record)
    }
}

impl Default for LinkedOpenVocabularies {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for LinkedOpenVocabularies {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Lov
    }

    fn source_title(&self) -> &'static str {
        SOURCE_TITLE
    }

    fn source_url(&self) -> &str {
        DUMP_URL
    }

    fn run(&self, ctx: &mut HarvestContext<'_>) -> Result<ExtractorSummary, IndexError> {
        ctx.narrate(format!("{SOURCE_TITLE}: extraction started"));
        let vocabularies = Self::parse_vocabularies(&ctx.fetcher.fetch(VOCABULARY_LIST_URL)?)?;
        ctx.narrate(format!("{} vocabularies to process", vocabularies.len()));

        let dump = self.load_dump(ctx)?;
        info!(quads = dump.len(), "LOV dump loaded");

        let mut summary = ExtractorSummary::new(self.kind());
        for vocabulary in &vocabularies {
            let label = format!("{} ({})", vocabulary.title, vocabulary.iri);
            let result = self.process(ctx, &dump, vocabulary);
            ctx.settle(&mut summary, &label, result)?;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;
    use crate::domain::Field;
    use crate::extractors::testing::*;
    use crate::graph::{Quad, Term};
    use crate::store::MetadataStore;

    const LIST: &str = r#"[
        {"uri": "http://vocab.example.org/a", "titles": [{"value": "Vocab \"A\"", "lang": "en"}]},
        {"uri": "http://vocab.example.org/b", "titles": [{"value": "Vocab B"}]},
        {"uri": "http://vocab.example.org/c", "titles": []},
        {"titles": [{"value": "no uri"}]}
    ]"#;

    const DUMP: &str = r#"@prefix dcat: <http://www.w3.org/ns/dcat#> .
@prefix dcterms: <http://purl.org/dc/terms/> .

<http://vocab.example.org/a> dcterms:description "Vocabulary A"@en ;
    dcat:distribution <http://lov.example.org/a/2020-01-01.n3>, <http://lov.example.org/a/2023-06-01.n3>, [ dcterms:title "blank" ] .
<http://vocab.example.org/b> dcat:distribution <http://lov.example.org/b/2021-01-01.n3> .
"#;

    const A_N3: &str = r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix dcterms: <http://purl.org/dc/terms/> .
<http://vocab.example.org/a> a owl:Ontology ;
    dcterms:description "From the file" ;
    dcterms:modified "2023-06-01" .
"#;

    fn gzip(content: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn parses_vocabulary_list() {
        let vocabularies = LinkedOpenVocabularies::parse_vocabularies(LIST).unwrap();
        assert_eq!(vocabularies.len(), 3);
        assert_eq!(vocabularies[0].title, "Vocab \"A\"");
        assert_eq!(vocabularies[2].title, "");
    }

    #[test]
    fn newest_distribution_first() {
        let dump = Graph::new(vec![
            Quad::new(
                Term::iri("http://v"),
                "http://www.w3.org/ns/dcat#distribution",
                Term::iri("http://f/2019.n3"),
            ),
            Quad::new(
                Term::iri("http://v"),
                "http://www.w3.org/ns/dcat#distribution",
                Term::BlankNode("_:b".to_string()),
            ),
            Quad::new(
                Term::iri("http://v"),
                "http://www.w3.org/ns/dcat#distribution",
                Term::iri("http://f/2022.n3"),
            ),
        ]);
        assert_eq!(
            LinkedOpenVocabularies::distributions(&dump, "http://v"),
            vec!["http://f/2022.n3", "http://f/2019.n3"]
        );
    }

    #[test]
    fn harvests_from_dump_and_distribution() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        let fetcher = MockFetcher::new(&root.join("cache"))
            .respond(VOCABULARY_LIST_URL, LIST)
            .file(DUMP_URL, gzip(DUMP))
            .file("http://lov.example.org/a/2023-06-01.n3", A_N3)
            .fail("http://lov.example.org/b/2021-01-01.n3", 404);
        let mut store = MetadataStore::open_in_memory().unwrap();

        let summary = run_extractor(&LinkedOpenVocabularies::new(), &mut store, &fetcher, &root)
            .unwrap();
        assert_eq!((summary.stored, summary.known, summary.skipped), (1, 0, 2));

        let entry = store.get_entry("http://vocab.example.org/a").unwrap().unwrap();
        assert_eq!(entry.title(), "Vocab \"A\"");
        assert_eq!(entry.get(Field::Summary), "Vocabulary A");
        assert_eq!(entry.get(Field::Modified), "2023-06-01");
        assert_eq!(
            entry.get(Field::LatestN3File),
            "http://lov.example.org/a/2023-06-01.n3"
        );
        assert!(!fetcher
            .requested()
            .contains(&"http://lov.example.org/a/2020-01-01.n3".to_string()));
    }
}
