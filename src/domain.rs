use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Every persisted column of an index entry, in projection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    OntologyTitle,
    OntologyIri,
    Summary,
    Authors,
    Contributors,
    LicenseInformation,
    ProjectPage,
    SourcePage,
    LatestJsonLdFile,
    LatestN3File,
    LatestNtriplesFile,
    LatestRdfXmlFile,
    LatestTurtleFile,
    Modified,
    Version,
    SourceTitle,
    SourceUrl,
}

impl Field {
    pub const ALL: [Field; 17] = [
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
        Field::SourceTitle,
        Field::SourceUrl,
    ];

    pub const FILES: [Field; 5] = [
        Field::LatestJsonLdFile,
        Field::LatestN3File,
        Field::LatestNtriplesFile,
        Field::LatestRdfXmlFile,
        Field::LatestTurtleFile,
    ];

    /// Columns a fill-only update may touch. The IRI is the key and the
    /// source columns belong to whoever stored the row first.
    pub const UPDATABLE: [Field; 14] = [
        Field::OntologyTitle,
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

    pub fn column(self) -> &'static str {
        match self {
            Field::OntologyTitle => "ontology_title",
            Field::OntologyIri => "ontology_iri",
            Field::Summary => "summary",
            Field::Authors => "authors",
            Field::Contributors => "contributors",
            Field::LicenseInformation => "license_information",
            Field::ProjectPage => "project_page",
            Field::SourcePage => "source_page",
            Field::LatestJsonLdFile => "latest_json_ld_file",
            Field::LatestN3File => "latest_n3_file",
            Field::LatestNtriplesFile => "latest_ntriples_file",
            Field::LatestRdfXmlFile => "latest_rdfxml_file",
            Field::LatestTurtleFile => "latest_turtle_file",
            Field::Modified => "modified",
            Field::Version => "version",
            Field::SourceTitle => "source_title",
            Field::SourceUrl => "source_url",
        }
    }

    /// Header label used in `index.csv`.
    pub fn label(self) -> &'static str {
        match self {
            Field::OntologyTitle => "ontology title",
            Field::OntologyIri => "ontology iri",
            Field::Summary => "summary",
            Field::Authors => "authors",
            Field::Contributors => "contributors",
            Field::LicenseInformation => "license information",
            Field::ProjectPage => "project page",
            Field::SourcePage => "source page",
            Field::LatestJsonLdFile => "latest json-ld file",
            Field::LatestN3File => "latest n3 file",
            Field::LatestNtriplesFile => "latest ntriples file",
            Field::LatestRdfXmlFile => "latest rdf/xml file",
            Field::LatestTurtleFile => "latest turtle file",
            Field::Modified => "modified",
            Field::Version => "version",
            Field::SourceTitle => "source title",
            Field::SourceUrl => "source url",
        }
    }

    pub fn is_file_link(self) -> bool {
        Self::FILES.contains(&self)
    }

    pub fn from_column(column: &str) -> Option<Field> {
        Self::ALL.into_iter().find(|field| field.column() == column)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// Case-folded form of an ontology IRI, used only for equality and lookups.
/// The verbatim IRI is what gets stored and displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OntologyIri(String);

impl OntologyIri {
    pub fn normalize(iri: &str) -> Self {
        Self(iri.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OntologyIri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// RDF serialization of a distribution file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RdfSyntax {
    JsonLd,
    N3,
    NTriples,
    RdfXml,
    Turtle,
}

impl RdfSyntax {
    /// Record column holding the latest file in this syntax.
    pub fn field(self) -> Field {
        match self {
            RdfSyntax::JsonLd => Field::LatestJsonLdFile,
            RdfSyntax::N3 => Field::LatestN3File,
            RdfSyntax::NTriples => Field::LatestNtriplesFile,
            RdfSyntax::RdfXml => Field::LatestRdfXmlFile,
            RdfSyntax::Turtle => Field::LatestTurtleFile,
        }
    }

    /// Input syntax name understood by `rapper -i`.
    pub fn rapper_name(self) -> &'static str {
        match self {
            RdfSyntax::JsonLd => "jsonld",
            RdfSyntax::N3 => "turtle",
            RdfSyntax::NTriples => "ntriples",
            RdfSyntax::RdfXml => "rdfxml",
            RdfSyntax::Turtle => "turtle",
        }
    }

    /// Guesses the syntax from the start of a file.
    pub fn sniff(content: &[u8]) -> Option<RdfSyntax> {
        const SNIFF_LIMIT: usize = 100 * 1024;
        let head = &content[..content.len().min(SNIFF_LIMIT)];
        let text = String::from_utf8_lossy(head);
        let trimmed = text.trim_start_matches('\u{feff}').trim_start();

        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Some(RdfSyntax::JsonLd);
        }
        if trimmed.starts_with("<?xml")
            || trimmed.starts_with("<rdf:RDF")
            || trimmed.starts_with("<!DOCTYPE rdf")
            || text.contains("<rdf:")
        {
            return Some(RdfSyntax::RdfXml);
        }
        if has_turtle_directives(&text) {
            return Some(RdfSyntax::Turtle);
        }
        if looks_like_ntriples(&text) {
            return Some(RdfSyntax::NTriples);
        }
        None
    }
}

impl fmt::Display for RdfSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfSyntax::JsonLd => write!(f, "jsonld"),
            RdfSyntax::N3 => write!(f, "n3"),
            RdfSyntax::NTriples => write!(f, "ntriples"),
            RdfSyntax::RdfXml => write!(f, "rdfxml"),
            RdfSyntax::Turtle => write!(f, "turtle"),
        }
    }
}

fn has_turtle_directives(text: &str) -> bool {
    text.lines().take(200).any(|line| {
        let line = line.trim_start();
        line.starts_with("@prefix")
            || line.starts_with("@base")
            || line.to_ascii_uppercase().starts_with("PREFIX ")
            || line.to_ascii_uppercase().starts_with("BASE ")
    })
}

fn looks_like_ntriples(text: &str) -> bool {
    let mut statements = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .take(20)
        .peekable();
    if statements.peek().is_none() {
        return false;
    }
    statements.all(|line| {
        (line.starts_with('<') || line.starts_with("_:")) && line.ends_with('.')
    })
}

/// Registries the harvester knows how to crawl, in default run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Archivo,
    Lov,
    Ols,
    Bioportal,
    Sweet,
}

impl ExtractorKind {
    pub const DEFAULT_ORDER: [ExtractorKind; 5] = [
        ExtractorKind::Archivo,
        ExtractorKind::Lov,
        ExtractorKind::Ols,
        ExtractorKind::Bioportal,
        ExtractorKind::Sweet,
    ];
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractorKind::Archivo => write!(f, "archivo"),
            ExtractorKind::Lov => write!(f, "lov"),
            ExtractorKind::Ols => write!(f, "ols"),
            ExtractorKind::Bioportal => write!(f, "bioportal"),
            ExtractorKind::Sweet => write!(f, "sweet"),
        }
    }
}

impl FromStr for ExtractorKind {
    type Err = IndexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "archivo" | "dbpedia-archivo" => Ok(ExtractorKind::Archivo),
            "lov" | "linked-open-vocabularies" => Ok(ExtractorKind::Lov),
            "ols" | "ontology-lookup-service" => Ok(ExtractorKind::Ols),
            "bioportal" => Ok(ExtractorKind::Bioportal),
            "sweet" => Ok(ExtractorKind::Sweet),
            _ => Err(IndexError::ConfigParse(format!(
                "unknown extractor: {value}"
            ))),
        }
    }
}
