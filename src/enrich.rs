use crate::domain::Field;
use crate::error::IndexError;
use crate::graph::Graph;
use crate::record::MetadataRecord;
use crate::text::{align_license, clean_string, is_blank, is_iso_date, is_url};

const SUMMARY: [&str; 5] = [
    "skos:definition",
    "dc11:description",
    "dc:description",
    "rdfs:comment",
    "schema:description",
];
const LICENSE: [&str; 5] = [
    "dc:license",
    "dc11:license",
    "dc:rights",
    "dc11:rights",
    "schema:license",
];
const AUTHORS: [&str; 3] = ["dc:creator", "dc11:creator", "schema:author"];
const CONTRIBUTORS: [&str; 3] = ["dc:contributor", "dc11:contributor", "schema:contributor"];
const PROJECT_PAGE: [&str; 3] = ["foaf:homepage", "schema:url", "rdfs:seeAlso"];
const VERSION: [&str; 3] = ["owl:versionInfo", "schema:schemaVersion", "schema:version"];
const MODIFIED: [&str; 3] = ["dc:modified", "dc11:modified", "schema:dateModified"];
const CREATED: [&str; 3] = ["dc:created", "dc11:created", "schema:dateCreated"];

const ONTOLOGY_ELEMENT_TYPES: [&str; 5] = [
    "owl:Ontology",
    "owl:Class",
    "rdf:Property",
    "rdfs:Class",
    "skos:Concept",
];

/// Fills blank descriptive fields of `record` from statements about its IRI.
pub fn add_further_metadata(record: &mut MetadataRecord, graph: &Graph) -> Result<(), IndexError> {
    let iri = record.iri().to_string();

    if let Some(summary) = first_value(graph, &iri, &SUMMARY) {
        record.fill(Field::Summary, &clean_string(&summary, true))?;
    }

    if let Some(license) = first_value(graph, &iri, &LICENSE) {
        record.fill(Field::LicenseInformation, &align_license(&license))?;
    }

    let authors = all_values(graph, &iri, &AUTHORS);
    if !authors.is_empty() {
        record.fill(Field::Authors, &clean_string(&authors.join(", "), true))?;
    }

    let contributors = all_values(graph, &iri, &CONTRIBUTORS);
    if !contributors.is_empty() {
        record.fill(Field::Contributors, &clean_string(&contributors.join(", "), true))?;
    }

    if let Some(page) = all_values(graph, &iri, &PROJECT_PAGE)
        .into_iter()
        .find(|value| is_url(value))
    {
        record.fill(Field::ProjectPage, &page)?;
    }

    if let Some(version) = first_value(graph, &iri, &VERSION) {
        record.fill(Field::Version, &clean_string(&version, true))?;
    }

    let modified = latest_date(graph, &iri, &MODIFIED).or_else(|| latest_date(graph, &iri, &CREATED));
    if let Some(modified) = modified {
        record.fill(Field::Modified, &modified)?;
    }
    Ok(())
}

/// True if the graph declares anything that makes it an ontology or
/// vocabulary file.
pub fn contains_ontology_elements(graph: &Graph) -> bool {
    ONTOLOGY_ELEMENT_TYPES
        .iter()
        .any(|rdf_type| graph.has_instances_of_type(rdf_type))
}

/// Values of one property, English literals preferred, blank nodes dropped.
fn property_values(graph: &Graph, subject: &str, property: &str) -> Vec<String> {
    let mut objects = graph.property_objects(subject, property, Some("en"));
    if objects.is_empty() {
        objects = graph.property_objects(subject, property, None);
    }
    objects
        .into_iter()
        .filter(|term| !term.is_blank_node() && !is_blank(term.value()))
        .map(|term| term.value().trim().to_string())
        .collect()
}

fn first_value(graph: &Graph, subject: &str, properties: &[&str]) -> Option<String> {
    properties
        .iter()
        .find_map(|property| property_values(graph, subject, property).into_iter().next())
}

fn all_values(graph: &Graph, subject: &str, properties: &[&str]) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for property in properties {
        for value in property_values(graph, subject, property) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    values
}

fn latest_date(graph: &Graph, subject: &str, properties: &[&str]) -> Option<String> {
    properties.iter().find_map(|property| {
        property_values(graph, subject, property)
            .into_iter()
            .filter(|value| is_iso_date(value))
            .max()
    })
}
