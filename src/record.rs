use serde::Serialize;

use crate::domain::{Field, OntologyIri, RdfSyntax};
use crate::error::IndexError;
use crate::text::{is_blank, is_url, truncate_date};

/// One ontology as seen by a single extraction pass.
///
/// Records are transient: an extractor fills one in, hands it to the store
/// and drops it. Distribution links are checked when they are set, so a
/// record never holds a file link that is not URL-shaped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataRecord {
    ontology_title: String,
    ontology_iri: String,
    summary: String,
    authors: String,
    contributors: String,
    license_information: String,
    project_page: String,
    source_page: String,
    latest_json_ld_file: String,
    latest_n3_file: String,
    latest_ntriples_file: String,
    latest_rdfxml_file: String,
    latest_turtle_file: String,
    modified: String,
    version: String,
    source_title: String,
    source_url: String,
}

impl MetadataRecord {
    pub fn new(source_title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            source_title: source_title.into().trim().to_string(),
            source_url: source_url.into().trim().to_string(),
            ..Self::default()
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::OntologyTitle => &self.ontology_title,
            Field::OntologyIri => &self.ontology_iri,
            Field::Summary => &self.summary,
            Field::Authors => &self.authors,
            Field::Contributors => &self.contributors,
            Field::LicenseInformation => &self.license_information,
            Field::ProjectPage => &self.project_page,
            Field::SourcePage => &self.source_page,
            Field::LatestJsonLdFile => &self.latest_json_ld_file,
            Field::LatestN3File => &self.latest_n3_file,
            Field::LatestNtriplesFile => &self.latest_ntriples_file,
            Field::LatestRdfXmlFile => &self.latest_rdfxml_file,
            Field::LatestTurtleFile => &self.latest_turtle_file,
            Field::Modified => &self.modified,
            Field::Version => &self.version,
            Field::SourceTitle => &self.source_title,
            Field::SourceUrl => &self.source_url,
        }
    }

    /// Sets a field, trimming the value first.
    ///
    /// Fails if a non-empty file link is not URL-shaped, or if the field is
    /// one of the source columns fixed by [`MetadataRecord::new`].
    pub fn set(&mut self, field: Field, value: &str) -> Result<&mut Self, IndexError> {
        let value = value.trim();
        if field == Field::OntologyIri && value.is_empty() {
            return Err(IndexError::Validation(
                "ontology IRI must not be blank".to_string(),
            ));
        }
        if field.is_file_link() && !value.is_empty() && !is_url(value) {
            return Err(IndexError::InvalidUrl {
                field: field.column(),
                value: value.to_string(),
            });
        }
        let slot = match field {
            Field::OntologyTitle => &mut self.ontology_title,
            Field::OntologyIri => &mut self.ontology_iri,
            Field::Summary => &mut self.summary,
            Field::Authors => &mut self.authors,
            Field::Contributors => &mut self.contributors,
            Field::LicenseInformation => &mut self.license_information,
            Field::ProjectPage => &mut self.project_page,
            Field::SourcePage => &mut self.source_page,
            Field::LatestJsonLdFile => &mut self.latest_json_ld_file,
            Field::LatestN3File => &mut self.latest_n3_file,
            Field::LatestNtriplesFile => &mut self.latest_ntriples_file,
            Field::LatestRdfXmlFile => &mut self.latest_rdfxml_file,
            Field::LatestTurtleFile => &mut self.latest_turtle_file,
            Field::Modified => {
                self.modified = truncate_date(value);
                return Ok(self);
            }
            Field::Version => &mut self.version,
            Field::SourceTitle | Field::SourceUrl => {
                return Err(IndexError::ImmutableField(field.column()));
            }
        };
        *slot = value.to_string();
        Ok(self)
    }

    /// Sets the field only while it is still blank. Returns whether it changed.
    pub fn fill(&mut self, field: Field, value: &str) -> Result<bool, IndexError> {
        if is_blank(value) || !is_blank(self.get(field)) {
            return Ok(false);
        }
        self.set(field, value)?;
        Ok(true)
    }

    pub fn set_title(&mut self, value: &str) -> &mut Self {
        self.ontology_title = value.trim().to_string();
        self
    }

    pub fn set_iri(&mut self, value: &str) -> Result<&mut Self, IndexError> {
        self.set(Field::OntologyIri, value)
    }

    pub fn set_file(&mut self, syntax: RdfSyntax, url: &str) -> Result<&mut Self, IndexError> {
        self.set(syntax.field(), url)
    }

    pub fn title(&self) -> &str {
        &self.ontology_title
    }

    pub fn iri(&self) -> &str {
        &self.ontology_iri
    }

    pub fn key(&self) -> OntologyIri {
        OntologyIri::normalize(&self.ontology_iri)
    }

    pub fn source_title(&self) -> &str {
        &self.source_title
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn modified(&self) -> &str {
        &self.modified
    }

    pub fn has_file_link(&self) -> bool {
        Field::FILES.iter().any(|field| !is_blank(self.get(*field)))
    }

    /// Title, IRI and at least one distribution link are required before a
    /// record may be stored.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if is_blank(&self.ontology_iri) {
            return Err(IndexError::Validation(format!(
                "ontology IRI is missing (title: {:?}, source: {})",
                self.ontology_title, self.source_title
            )));
        }
        if is_blank(&self.ontology_title) {
            return Err(IndexError::Validation(format!(
                "ontology title is missing for {}",
                self.ontology_iri
            )));
        }
        if !self.has_file_link() {
            return Err(IndexError::Validation(format!(
                "no distribution file link for {}",
                self.ontology_iri
            )));
        }
        if is_blank(&self.source_title) || is_blank(&self.source_url) {
            return Err(IndexError::Validation(format!(
                "source title and URL are required for {}",
                self.ontology_iri
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn record() -> MetadataRecord {
        MetadataRecord::new("Test source", "https://example.org/source")
    }

    #[test]
    fn setters_trim() {
        let mut entry = record();
        entry.set_title("  Onto  ").set_iri(" http://onto/1 ").unwrap();
        assert_eq!(entry.title(), "Onto");
        assert_eq!(entry.iri(), "http://onto/1");
        assert_matches!(entry.set_iri("  "), Err(IndexError::Validation(_)));
    }

    #[test]
    fn rejects_non_url_file_links() {
        let mut entry = record();
        for file in Field::FILES {
            let err = entry.set(file, "onto.ttl").unwrap_err();
            assert_matches!(err, IndexError::InvalidUrl { field, .. } if field == file.column());
            assert!(entry.set(file, "").is_ok());
            assert!(entry.set(file, "www.example.org/o.ttl").is_ok());
        }
        let err = entry.set_file(RdfSyntax::N3, "ftp.example.org/o.n3").unwrap_err();
        assert_matches!(err, IndexError::InvalidUrl { field: "latest_n3_file", .. });
    }

    #[test]
    fn modified_keeps_date_part() {
        let mut entry = record();
        entry.set(Field::Modified, "2023-11-02 00:00:00").unwrap();
        assert_eq!(entry.modified(), "2023-11-02");
    }

    #[test]
    fn source_is_immutable() {
        let mut entry = record();
        let err = entry.set(Field::SourceTitle, "other").unwrap_err();
        assert_matches!(err, IndexError::ImmutableField("source_title"));
    }

    #[test]
    fn validity_requires_title_iri_and_file() {
        let mut entry = record();
        assert!(!entry.is_valid());
        entry.set_iri("http://onto/1").unwrap();
        assert!(!entry.is_valid());
        entry.set_title("A");
        assert!(!entry.is_valid());
        entry
            .set(Field::LatestTurtleFile, "http://f/1.ttl")
            .unwrap();
        assert!(entry.is_valid());
    }

    #[test]
    fn fill_leaves_populated_fields() {
        let mut entry = record();
        assert!(entry.fill(Field::Summary, "first").unwrap());
        assert!(!entry.fill(Field::Summary, "second").unwrap());
        assert!(!entry.fill(Field::Version, "  ").unwrap());
        assert_eq!(entry.get(Field::Summary), "first");
    }
}
