use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use tracing::{debug, info};

use super::{Extractor, ExtractorSummary, HarvestContext, Outcome};
use crate::domain::{ExtractorKind, Field, RdfSyntax};
use crate::enrich::{add_further_metadata, contains_ontology_elements};
use crate::error::IndexError;
use crate::record::MetadataRecord;
use crate::text::{clean_string, is_blank};

const SOURCE_TITLE: &str = "DBpedia Archivo";
const LIST_URL: &str = "https://archivo.dbpedia.org/list";
const BASE_URL: &str = "https://archivo.dbpedia.org";
const DOWNLOAD_URL: &str = "http://archivo.dbpedia.org/download";

static ROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?si)<tr>(.*?)</tr>").unwrap());
static INFO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?si)<td>\s*<a href="(/info\?o=.*?)">(.*?)<"#).unwrap()
});
static IRI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?si)<td>\s*<a href="/info\?o=(.*?)""#).unwrap());
static LAST_UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?si)nt</a>.*?>([0-9]{4})\.([0-9]{2})\.([0-9]{2})").unwrap()
});

/// One row of the Archivo ontology table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivoEntry {
    pub title: String,
    pub iri: String,
    pub info_page: String,
    pub last_update: Option<String>,
}

/// Scrapes the ontology table of DBpedia Archivo. Every listed ontology
/// comes with N-Triples, RDF/XML and Turtle downloads.
pub struct DbpediaArchivo;

impl DbpediaArchivo {
    pub fn new() -> Self {
        Self
    }

    /// Rows without title or IRI are dropped. A missing update date is only
    /// an error once the ontology turns out to be new.
    pub fn parse_list(html: &str) -> Result<Vec<ArchivoEntry>, IndexError> {
        let rows: Vec<&str> = ROW_RE
            .captures_iter(html)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        if rows.is_empty() {
            return Err(IndexError::extraction(
                SOURCE_TITLE,
                format!("no ontology entries found at {LIST_URL}"),
            ));
        }

        let mut entries = Vec::new();
        for row in rows {
            if row.contains("<th ") {
                continue;
            }
            let Some(info) = INFO_RE.captures(row) else {
                debug!(row, "row without info link ignored");
                continue;
            };
            let title = clean_string(&info[2], true);
            if is_blank(&title) {
                debug!(row, "row without title ignored");
                continue;
            }
            let iri = IRI_RE
                .captures(row)
                .map(|caps| caps[1].trim().to_string())
                .unwrap_or_default();
            if is_blank(&iri) {
                debug!(row, "row without ontology IRI ignored");
                continue;
            }
            let last_update = LAST_UPDATE_RE
                .captures(row)
                .map(|caps| format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]));
            entries.push(ArchivoEntry {
                title,
                iri,
                info_page: format!("{BASE_URL}{}", &info[1]),
                last_update,
            });
        }
        Ok(entries)
    }

    pub fn download_url(iri: &str, format: &str) -> Result<String, IndexError> {
        Url::parse_with_params(DOWNLOAD_URL, [("o", iri), ("f", format)])
            .map(String::from)
            .map_err(|err| IndexError::extraction(SOURCE_TITLE, err.to_string()))
    }

    fn record_for(&self, entry: &ArchivoEntry) -> Result<MetadataRecord, IndexError> {
        let Some(last_update) = &entry.last_update else {
            return Err(IndexError::extraction(
                SOURCE_TITLE,
                format!("cannot read the last update of {}", entry.iri),
            ));
        };
        let mut record = self.prepared_record();
        record
            .set_title(&entry.title)
            .set_iri(&entry.iri)?
            .set(Field::SourcePage, &entry.info_page)?
            .set(Field::Modified, last_update)?;
        record.set_file(RdfSyntax::NTriples, &Self::download_url(&entry.iri, "nt")?)?;
        record.set_file(RdfSyntax::RdfXml, &Self::download_url(&entry.iri, "owl")?)?;
        record.set_file(RdfSyntax::Turtle, &Self::download_url(&entry.iri, "ttl")?)?;
        Ok(record)
    }

    fn process(
        &self,
        ctx: &mut HarvestContext<'_>,
        entry: &ArchivoEntry,
    ) -> Result<Outcome, IndexError> {
        if ctx.is_known(&entry.iri)? {
            return Ok(Outcome::Known);
        }
        let mut record = self.record_for(entry)?;
        let nt_file = record.get(Field::LatestNtriplesFile).to_string();
        let graph = ctx.load_remote_graph(&nt_file, Some(RdfSyntax::NTriples))?;
        if !contains_ontology_elements(&graph) {
            return Ok(Outcome::skipped(format!(
                "{nt_file} does not contain any ontology elements"
            )));
        }
        add_further_metadata(&mut record, &graph)?;
        ctx.store(record)
    }
}

impl Default for DbpediaArchivo {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for DbpediaArchivo {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Archivo
    }

    fn source_title(&self) -> &'static str {
        SOURCE_TITLE
    }

    fn source_url(&self) -> &str {
        LIST_URL
    }

    fn run(&self, ctx: &mut HarvestContext<'_>) -> Result<ExtractorSummary, IndexError> {
        ctx.narrate(format!("{SOURCE_TITLE}: extraction started"));
        let html = ctx.fetcher.fetch(LIST_URL)?;
        let entries = Self::parse_list(&html)?;
        info!(count = entries.len(), "archivo ontologies listed");

        let mut summary = ExtractorSummary::new(self.kind());
        for entry in &entries {
            let label = format!("{} ({})", entry.title, entry.iri);
            let result = self.process(ctx, entry);
            ctx.settle(&mut summary, &label, result)?;
        }
        Ok(summary)
    }
}
