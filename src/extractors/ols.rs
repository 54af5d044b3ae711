use serde::Deserialize;
use tracing::{debug, info};

use super::{Extractor, ExtractorSummary, HarvestContext, Outcome, day_of};
use crate::domain::{ExtractorKind, Field};
use crate::enrich::{add_further_metadata, contains_ontology_elements};
use crate::error::IndexError;
use crate::text::{clean_string, is_blank, is_url};

const SOURCE_TITLE: &str = "Ontology Lookup Service (OLS)";
const LIST_URL: &str = "https://www.ebi.ac.uk/ols4/api/ontologies";
const CACHE_NAMESPACE: &str = "extractor_ontology_lookup_service";

#[derive(Debug, Deserialize)]
struct OlsPage {
    #[serde(default)]
    page: Option<OlsPageInfo>,
    #[serde(rename = "_embedded", default)]
    embedded: Option<OlsEmbedded>,
}

#[derive(Debug, Deserialize)]
struct OlsPageInfo {
    #[serde(rename = "totalPages", default)]
    total_pages: u64,
}

#[derive(Debug, Deserialize)]
struct OlsEmbedded {
    #[serde(default)]
    ontologies: Vec<OlsOntology>,
}

#[derive(Debug, Deserialize)]
struct OlsOntology {
    #[serde(rename = "ontologyId", default)]
    id: Option<String>,
    #[serde(default)]
    config: OlsConfig,
    #[serde(default)]
    updated: Option<String>,
    #[serde(rename = "_links", default)]
    links: OlsLinks,
}

#[derive(Debug, Default, Deserialize)]
struct OlsConfig {
    #[serde(rename = "fileLocation", default)]
    file_location: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OlsLinks {
    #[serde(default)]
    terms: Option<OlsLink>,
}

#[derive(Debug, Deserialize)]
struct OlsLink {
    href: String,
}

#[derive(Debug, Deserialize)]
struct OlsTerms {
    #[serde(default)]
    status: Option<serde_json::Value>,
    #[serde(rename = "_embedded", default)]
    embedded: Option<OlsTermsEmbedded>,
}

#[derive(Debug, Deserialize)]
struct OlsTermsEmbedded {
    #[serde(default)]
    terms: Vec<OlsTerm>,
}

#[derive(Debug, Deserialize)]
struct OlsTerm {
    #[serde(default)]
    ontology_iri: Option<String>,
}

/// Crawls the paginated ontology listing of the EBI Ontology Lookup
/// Service. The ontology IRI is only available on the term listing, so one
/// extra request per ontology is needed before the store can be asked.
pub struct OntologyLookupService;

impl OntologyLookupService {
    pub fn new() -> Self {
        Self
    }

    pub fn page_url(page: u64) -> String {
        format!("{LIST_URL}?page={page}")
    }

    /// Ontology IRI from a term listing, or why there is none.
    pub fn ontology_iri_from_terms(json: &str) -> Result<String, String> {
        let terms: OlsTerms =
            serde_json::from_str(json).map_err(|err| format!("unreadable term listing: {err}"))?;
        if let Some(status) = terms.status {
            return Err(format!("term listing answered with status {status}"));
        }
        let embedded = terms
            .embedded
            .ok_or_else(|| "term listing without _embedded".to_string())?;
        embedded
            .terms
            .into_iter()
            .find_map(|term| term.ontology_iri.filter(|iri| !is_blank(iri)))
            .ok_or_else(|| "term listing without ontology IRI".to_string())
    }

    fn total_pages(&self, ctx: &HarvestContext<'_>) -> Result<u64, IndexError> {
        let first: OlsPage = ctx.fetch_json(SOURCE_TITLE, LIST_URL, None)?;
        match first.page {
            Some(page) if page.total_pages > 0 => Ok(page.total_pages),
            _ => Err(IndexError::extraction(
                SOURCE_TITLE,
                "could not determine total number of pages",
            )),
        }
    }

    fn process(
        &self,
        ctx: &mut HarvestContext<'_>,
        ontology: &OlsOntology,
    ) -> Result<Outcome, IndexError> {
        let Some(terms) = &ontology.links.terms else {
            return Ok(Outcome::skipped("no term listing linked"));
        };
        let body = ctx.fetcher.fetch_cached(&terms.href, CACHE_NAMESPACE)?;
        let iri = match Self::ontology_iri_from_terms(&body) {
            Ok(iri) => iri,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };
        if ctx.is_known(&iri)? {
            return Ok(Outcome::Known);
        }

        let file = match ontology.config.file_location.as_deref() {
            Some(file) if is_url(file) => file.trim().to_string(),
            _ => return Ok(Outcome::skipped("no downloadable file location")),
        };
        let Some(format) = ctx.guess_format(&file)? else {
            return Ok(Outcome::skipped(format!("unknown RDF format of {file}")));
        };
        let graph = ctx.load_remote_graph(&file, Some(format))?;

        let mut record = self.prepared_record();
        record.set_iri(&iri)?;
        let title = ontology
            .config
            .title
            .as_deref()
            .filter(|title| !is_blank(title))
            .or_else(|| graph.label(&iri, None))
            .map(|title| clean_string(title, false));
        match title {
            Some(title) if !is_blank(&title) => {
                record.set_title(&title);
            }
            _ => return Ok(Outcome::skipped("no title found")),
        }
        if let Some(updated) = ontology.updated.as_deref().and_then(day_of) {
            record.set(Field::Modified, &updated)?;
        }
        record.set_file(format, &file)?;

        if !contains_ontology_elements(&graph) {
            return Ok(Outcome::skipped(format!(
                "{file} does not contain any ontology elements"
            )));
        }
        add_further_metadata(&mut record, &graph)?;
        ctx.store(record)
    }
}

impl Default for OntologyLookupService {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for OntologyLookupService {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Ols
    }

    fn source_title(&self) -> &'static str {
        SOURCE_TITLE
    }

    fn source_url(&self) -> &str {
        LIST_URL
    }

    fn run(&self, ctx: &mut HarvestContext<'_>) -> Result<ExtractorSummary, IndexError> {
        ctx.narrate(format!("{SOURCE_TITLE}: extraction started"));
        let total_pages = self.total_pages(ctx)?;
        info!(total_pages, "OLS pages to crawl");

        let mut summary = ExtractorSummary::new(self.kind());
        for page in 0..total_pages {
            ctx.narrate(format!("{SOURCE_TITLE}: page {} of {total_pages}", page + 1));
            let listing: OlsPage =
                ctx.fetch_json(SOURCE_TITLE, &Self::page_url(page), Some(CACHE_NAMESPACE))?;
            let Some(embedded) = listing.embedded else {
                debug!(page, "page without ontologies");
                continue;
            };
            for ontology in &embedded.ontologies {
                let label = ontology
                    .id
                    .clone()
                    .or_else(|| ontology.config.title.clone())
                    .unwrap_or_else(|| "unnamed ontology".to_string());
                let result = self.process(ctx, ontology);
                ctx.settle(&mut summary, &label, result)?;
            }
        }
        Ok(summary)
    }
}
