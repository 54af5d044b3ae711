use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::info;

use super::{Extractor, ExtractorSummary, HarvestContext, Outcome, day_of};
use crate::domain::{ExtractorKind, Field, RdfSyntax};
use crate::enrich::{add_further_metadata, contains_ontology_elements};
use crate::error::IndexError;
use crate::text::{clean_string, is_blank, is_url};

const SOURCE_TITLE: &str = "BioPortal";
const DOCUMENTATION_URL: &str = "https://data.bioontology.org/documentation";
const LIST_URL: &str =
    "https://data.bioontology.org/ontologies?include=all&display_context=false&display_links=true&apikey=";
const SUBMISSION_QUERY: &str = "?include=all&display_context=false&display_links=false&apikey=";
const CACHE_NAMESPACE: &str = "extractor_bioportal";

/// Downloads that take hours; they are fetched separately.
const OVERSIZED: [&str; 2] = [
    "data.bioontology.org/ontologies/DRON/",
    "data.bioontology.org/ontologies/HOOM/",
];

static RDF_DOWNLOAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?si)href='(https://data\.bioontology\.org/ontologies/[a-zA-Z\-_]+/download)\?apikey=.*?&(download_format=rdf)",
    )
    .unwrap()
});

#[derive(Debug, Deserialize)]
struct BioPortalOntology {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    acronym: Option<String>,
    #[serde(default)]
    links: BioPortalLinks,
}

#[derive(Debug, Default, Deserialize)]
struct BioPortalLinks {
    #[serde(default)]
    latest_submission: Option<String>,
    #[serde(default)]
    ui: Option<String>,
    #[serde(default)]
    download: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Submission {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    released: Option<String>,
}

/// Where to get an ontology file from. `link` is what ends up in the index,
/// `fetch_url` carries the API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub link: String,
    pub fetch_url: String,
    pub format: Option<RdfSyntax>,
}

/// Walks the BioPortal REST API. Requires a personal API key.
pub struct BioPortal {
    api_key: String,
}

impl BioPortal {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn list_url(&self) -> String {
        format!("{LIST_URL}{}", self.api_key)
    }

    /// RDF/XML download link as offered on an ontology's UI page.
    pub fn rdf_download_from_ui(&self, html: &str) -> Option<Download> {
        let caps = RDF_DOWNLOAD_RE.captures(html)?;
        let link = format!("{}?{}", &caps[1], &caps[2]);
        Some(Download {
            fetch_url: format!("{link}&apikey={}", self.api_key),
            link,
            format: Some(RdfSyntax::RdfXml),
        })
    }

    fn redact(&self, err: IndexError) -> IndexError {
        match err {
            IndexError::HttpStatus { status, url } => IndexError::HttpStatus {
                status,
                url: url.replace(&self.api_key, "***"),
            },
            IndexError::Http(message) => IndexError::Http(message.replace(&self.api_key, "***")),
            IndexError::Timeout(message) => {
                IndexError::Timeout(message.replace(&self.api_key, "***"))
            }
            other => other,
        }
    }

    fn process(
        &self,
        ctx: &mut HarvestContext<'_>,
        ontology: &BioPortalOntology,
    ) -> Result<Outcome, IndexError> {
        let title = clean_string(ontology.name.as_deref().unwrap_or_default(), false);
        if is_blank(&title) {
            return Ok(Outcome::skipped("no name"));
        }
        let Some(submission_link) = &ontology.links.latest_submission else {
            return Ok(Outcome::skipped("no latest submission"));
        };

        let submission_url = format!("{submission_link}{SUBMISSION_QUERY}{}", self.api_key);
        let body = ctx.fetcher.fetch_cached(&submission_url, CACHE_NAMESPACE)?;
        let submission = serde_json::from_str::<Option<Submission>>(&body)
            .ok()
            .flatten();
        let Some(iri) = submission
            .as_ref()
            .and_then(|submission| submission.uri.clone())
            .filter(|uri| !is_blank(uri))
        else {
            return Ok(Outcome::skipped("latest submission is empty"));
        };
        if ctx.is_known(&iri)? {
            return Ok(Outcome::Known);
        }

        let mut record = self.prepared_record();
        record.set_title(&title).set_iri(&iri)?;

        let ui = ontology.links.ui.as_deref().filter(|ui| is_url(ui));
        let mut download = None;
        if let Some(ui) = ui {
            record.set(Field::SourcePage, ui)?;
            let html = ctx.fetcher.fetch_cached(ui, CACHE_NAMESPACE)?;
            download = self.rdf_download_from_ui(&html);
        }
        let download = match download {
            Some(download) if is_oversized(&download.fetch_url) => {
                return Ok(Outcome::skipped("too large, fetched separately"));
            }
            Some(download) => download,
            None => {
                let Some(link) = ontology.links.download.as_deref().filter(|link| is_url(link))
                else {
                    return Ok(Outcome::skipped("no download link"));
                };
                let fetch_url = format!("{link}?apikey={}", self.api_key);
                if is_oversized(&fetch_url) {
                    return Ok(Outcome::skipped("too large, fetched separately"));
                }
                let format = ctx.guess_format(&fetch_url)?;
                Download {
                    link: link.to_string(),
                    fetch_url,
                    format,
                }
            }
        };
        let format = match download.format {
            Some(format @ (RdfSyntax::NTriples | RdfSyntax::RdfXml | RdfSyntax::Turtle)) => format,
            Some(other) => {
                return Ok(Outcome::skipped(format!("unsupported RDF notation {other}")));
            }
            None => return Ok(Outcome::skipped("unknown RDF format")),
        };
        record.set_file(format, &download.link)?;

        let graph = ctx.load_remote_graph(&download.fetch_url, Some(format))?;
        // files that could not be parsed still get listed
        if !contains_ontology_elements(&graph) && !graph.is_empty() {
            return Ok(Outcome::skipped(format!(
                "{} does not contain any ontology elements",
                download.link
            )));
        }
        add_further_metadata(&mut record, &graph)?;
        if is_blank(record.modified()) {
            let released = submission
                .as_ref()
                .and_then(|submission| submission.released.as_deref())
                .and_then(day_of);
            if let Some(released) = released {
                record.set(Field::Modified, &released)?;
            }
        }
        ctx.store(record)
    }
}

fn is_oversized(url: &str) -> bool {
    OVERSIZED.iter().any(|marker| url.contains(marker))
}

impl Extractor for BioPortal {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Bioportal
    }

    fn source_title(&self) -> &'static str {
        SOURCE_TITLE
    }

    fn source_url(&self) -> &str {
        DOCUMENTATION_URL
    }

    fn run(&self, ctx: &mut HarvestContext<'_>) -> Result<ExtractorSummary, IndexError> {
        ctx.narrate(format!("{SOURCE_TITLE}: extraction started"));
        let ontologies: Vec<BioPortalOntology> = ctx
            .fetch_json(SOURCE_TITLE, &self.list_url(), Some(CACHE_NAMESPACE))
            .map_err(|err| self.redact(err))?;
        info!(count = ontologies.len(), "BioPortal ontologies listed");

        let mut summary = ExtractorSummary::new(self.kind());
        for ontology in &ontologies {
            let label = ontology
                .name
                .clone()
                .or_else(|| ontology.acronym.clone())
                .unwrap_or_else(|| "unnamed ontology".to_string());
            let result = self
                .process(ctx, ontology)
                .map_err(|err| self.redact(err));
            ctx.settle(&mut summary, &label, result)?;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::testing::*;
    use crate::store::MetadataStore;

    const KEY: &str = "secret-key";

    const ONTO_TTL: &str = r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix dcterms: <http://purl.org/dc/terms/> .
<http://purl.bioontology.org/ontology/ONE> a owl:Ontology ;
    dcterms:license <http://creativecommons.org/licenses/by/4.0/> .
"#;

    const TWO_OWL: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:owl="http://www.w3.org/2002/07/owl#">
  <owl:Class rdf:about="http://purl.bioontology.org/ontology/TWO#A"/>
</rdf:RDF>
"#;

    fn list() -> String {
        r#"[
          {"name": "Ontology One", "acronym": "ONE", "links": {
            "latest_submission": "https://data.bioontology.org/ontologies/ONE/latest_submission",
            "ui": "http://bioportal.bioontology.org/ontologies/ONE",
            "download": "https://data.bioontology.org/ontologies/ONE/download"}},
          {"name": "Ontology Two", "acronym": "TWO", "links": {
            "latest_submission": "https://data.bioontology.org/ontologies/TWO/latest_submission",
            "ui": "http://bioportal.bioontology.org/ontologies/TWO",
            "download": "https://data.bioontology.org/ontologies/TWO/download"}},
          {"name": "Drug Ontology", "acronym": "DRON", "links": {
            "latest_submission": "https://data.bioontology.org/ontologies/DRON/latest_submission",
            "download": "https://data.bioontology.org/ontologies/DRON/download"}},
          {"name": "Empty", "acronym": "EMPTY", "links": {
            "latest_submission": "https://data.bioontology.org/ontologies/EMPTY/latest_submission"}}
        ]"#
        .to_string()
    }

    fn submission_url(acronym: &str) -> String {
        format!(
            "https://data.bioontology.org/ontologies/{acronym}/latest_submission{SUBMISSION_QUERY}{KEY}"
        )
    }

    #[test]
    fn ui_page_rdf_link() {
        let bioportal = BioPortal::new(KEY);
        let html = "<a href='https://data.bioontology.org/ontologies/TWO/download?apikey=abc&download_format=rdf'>RDF/XML</a>";
        let download = bioportal.rdf_download_from_ui(html).unwrap();
        assert_eq!(
            download.link,
            "https://data.bioontology.org/ontologies/TWO/download?download_format=rdf"
        );
        assert_eq!(
            download.fetch_url,
            format!("https://data.bioontology.org/ontologies/TWO/download?download_format=rdf&apikey={KEY}")
        );
        assert!(bioportal.rdf_download_from_ui("<html></html>").is_none());
    }

    #[test]
    fn harvests_with_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        let bioportal = BioPortal::new(KEY);
        let fetcher = MockFetcher::new(&root)
            .respond(&bioportal.list_url(), &list())
            .respond(
                &submission_url("ONE"),
                r#"{"uri": "http://purl.bioontology.org/ontology/ONE", "released": "2023-05-01T00:00:00-07:00"}"#,
            )
            .respond("http://bioportal.bioontology.org/ontologies/ONE", "<html>no rdf link</html>")
            .file(
                &format!("https://data.bioontology.org/ontologies/ONE/download?apikey={KEY}"),
                ONTO_TTL,
            )
            .respond(
                &submission_url("TWO"),
                r#"{"uri": "http://purl.bioontology.org/ontology/TWO", "released": "2020-01-01"}"#,
            )
            .respond(
                "http://bioportal.bioontology.org/ontologies/TWO",
                "<a href='https://data.bioontology.org/ontologies/TWO/download?apikey=x&download_format=rdf'>",
            )
            .file(
                &format!(
                    "https://data.bioontology.org/ontologies/TWO/download?download_format=rdf&apikey={KEY}"
                ),
                TWO_OWL,
            )
            .respond(
                &submission_url("DRON"),
                r#"{"uri": "http://purl.obolibrary.org/obo/dron.owl"}"#,
            )
            .file(
                &format!("https://data.bioontology.org/ontologies/DRON/download?apikey={KEY}"),
                ONTO_TTL,
            )
            .respond(&submission_url("EMPTY"), "null");
        let mut store = MetadataStore::open_in_memory().unwrap();

        let summary = run_extractor(&bioportal, &mut store, &fetcher, &root).unwrap();
        assert_eq!((summary.stored, summary.known, summary.skipped), (2, 0, 2));

        let one = store
            .get_entry("http://purl.bioontology.org/ontology/ONE")
            .unwrap()
            .unwrap();
        assert_eq!(one.get(Field::LicenseInformation), "CC-BY 4.0");
        assert_eq!(one.get(Field::Modified), "2023-05-01");
        assert_eq!(
            one.get(Field::LatestTurtleFile),
            "https://data.bioontology.org/ontologies/ONE/download"
        );
        assert_eq!(
            one.get(Field::SourcePage),
            "http://bioportal.bioontology.org/ontologies/ONE"
        );

        let two = store
            .get_entry("http://purl.bioontology.org/ontology/TWO")
            .unwrap()
            .unwrap();
        assert_eq!(
            two.get(Field::LatestRdfXmlFile),
            "https://data.bioontology.org/ontologies/TWO/download?download_format=rdf"
        );
        for entry in store.all_entries().unwrap() {
            for field in Field::ALL {
                assert!(!entry.get(field).contains(KEY));
            }
        }
    }

    #[test]
    fn errors_do_not_leak_the_key() {
        let bioportal = BioPortal::new(KEY);
        let err = bioportal.redact(IndexError::HttpStatus {
            status: 404,
            url: format!("https://x.org/download?apikey={KEY}"),
        });
        assert!(!err.to_string().contains(KEY));
    }
}
