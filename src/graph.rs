use std::borrow::Cow;
use std::collections::HashMap;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Prefixes accepted in CURIE arguments.
const PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("dc", "http://purl.org/dc/terms/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("dc11", "http://purl.org/dc/elements/1.1/"),
    ("dcat", "http://www.w3.org/ns/dcat#"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("schema", "http://schema.org/"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

const LABEL_PROPERTIES: [&str; 5] = [
    "skos:prefLabel",
    "rdfs:label",
    "foaf:name",
    "dc:title",
    "dc11:title",
];

/// Expands `prefix:local` for a known prefix; anything else is returned as is.
pub fn expand(value: &str) -> Cow<'_, str> {
    if let Some((prefix, local)) = value.split_once(':') {
        if !local.starts_with("//") {
            if let Some((_, namespace)) = PREFIXES.iter().find(|(known, _)| *known == prefix) {
                return Cow::Owned(format!("{namespace}{local}"));
            }
        }
    }
    Cow::Borrowed(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    BlankNode(String),
    Literal {
        value: String,
        language: Option<String>,
        datatype: Option<String>,
    },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            language: Some(language.into()),
            datatype: None,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Term::Iri(value) | Term::BlankNode(value) => value,
            Term::Literal { value, .. } => value,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Term::Literal { language, .. } => language.as_deref(),
            _ => None,
        }
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    fn matches_lang(&self, lang: Option<&str>) -> bool {
        match lang {
            None => true,
            Some(lang) => self
                .language()
                .map(|tag| tag.eq_ignore_ascii_case(lang))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quad {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

impl Quad {
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }
}

/// Quads read from one file, indexed by subject.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    quads: Vec<Quad>,
    by_subject: HashMap<String, Vec<usize>>,
}

impl Graph {
    pub fn new(quads: Vec<Quad>) -> Self {
        let mut by_subject: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, quad) in quads.iter().enumerate() {
            by_subject
                .entry(quad.subject.value().to_string())
                .or_default()
                .push(idx);
        }
        Self { quads, by_subject }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    /// Objects of `subject property ?o`, optionally limited to literals in
    /// language `lang`.
    pub fn property_objects(&self, subject: &str, property: &str, lang: Option<&str>) -> Vec<&Term> {
        let property = expand(property);
        let Some(indices) = self.by_subject.get(&*expand(subject)) else {
            return Vec::new();
        };
        indices
            .iter()
            .map(|idx| &self.quads[*idx])
            .filter(|quad| quad.predicate == property && quad.object.matches_lang(lang))
            .map(|quad| &quad.object)
            .collect()
    }

    pub fn property_values(&self, subject: &str, property: &str, lang: Option<&str>) -> Vec<&str> {
        self.property_objects(subject, property, lang)
            .into_iter()
            .map(Term::value)
            .collect()
    }

    /// First label found, checking skos:prefLabel, rdfs:label, foaf:name,
    /// dcterms:title and dc:title in that order.
    pub fn label(&self, subject: &str, lang: Option<&str>) -> Option<&str> {
        LABEL_PROPERTIES.iter().find_map(|property| {
            self.property_values(subject, property, lang)
                .into_iter()
                .find(|value| !value.trim().is_empty())
        })
    }

    pub fn has_subject(&self, subject: &str) -> bool {
        self.by_subject.contains_key(&*expand(subject))
    }

    pub fn instances_of_type(&self, rdf_type: &str) -> Vec<&str> {
        let rdf_type = expand(rdf_type);
        let mut instances: Vec<&str> = Vec::new();
        for quad in &self.quads {
            if quad.predicate == RDF_TYPE
                && quad.object.value() == rdf_type
                && !instances.contains(&quad.subject.value())
            {
                instances.push(quad.subject.value());
            }
        }
        instances
    }

    pub fn has_instances_of_type(&self, rdf_type: &str) -> bool {
        let rdf_type = expand(rdf_type);
        self.quads
            .iter()
            .any(|quad| quad.predicate == RDF_TYPE && quad.object.value() == rdf_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Graph {
        Graph::new(vec![
            Quad::new(Term::iri("http://foo"), "http://bar", Term::iri("http://baz")),
            Quad::new(
                Term::iri("http://foo"),
                "http://www.w3.org/ns/dcat#distribution",
                Term::iri("http://link"),
            ),
            Quad::new(Term::iri("http://foo"), "http://tttt/", Term::literal("1.0")),
            Quad::new(
                Term::iri("http://foo"),
                "http://tttt/",
                Term::lang_literal("in en", "en"),
            ),
            Quad::new(
                Term::iri("http://concept1"),
                RDF_TYPE,
                Term::iri("http://www.w3.org/2004/02/skos/core#Concept"),
            ),
        ])
    }

    #[test]
    fn property_values() {
        let graph = sample();
        assert_eq!(graph.property_values("http://foo", "http://bar", None), vec!["http://baz"]);
        assert_eq!(
            graph.property_values("http://foo", "dcat:distribution", None),
            vec!["http://link"]
        );
        assert_eq!(
            graph.property_values("http://foo", "http://tttt/", Some("en")),
            vec!["in en"]
        );
        assert_eq!(graph.property_values("http://foo", "http://tttt/", None).len(), 2);
    }

    #[test]
    fn instances_of_type() {
        let graph = sample();
        assert!(graph.has_instances_of_type("skos:Concept"));
        assert!(graph.has_instances_of_type("http://www.w3.org/2004/02/skos/core#Concept"));
        assert!(!graph.has_instances_of_type("owl:Ontology"));
        assert_eq!(graph.instances_of_type("skos:Concept"), vec!["http://concept1"]);
    }

    #[test]
    fn label_priority() {
        let graph = Graph::new(vec![
            Quad::new(Term::iri("http://o"), "http://purl.org/dc/terms/title", Term::literal("Title")),
            Quad::new(
                Term::iri("http://o"),
                "http://www.w3.org/2000/01/rdf-schema#label",
                Term::lang_literal("Etikett", "de"),
            ),
            Quad::new(
                Term::iri("http://o"),
                "http://www.w3.org/2000/01/rdf-schema#label",
                Term::lang_literal("Label", "en"),
            ),
        ]);
        assert_eq!(graph.label("http://o", None), Some("Etikett"));
        assert_eq!(graph.label("http://o", Some("en")), Some("Label"));
        assert_eq!(graph.label("http://missing", None), None);
    }

    #[test]
    fn curie_expansion() {
        assert_eq!(expand("owl:Ontology"), "http://www.w3.org/2002/07/owl#Ontology");
        assert_eq!(expand("dc:license"), "http://purl.org/dc/terms/license");
        assert_eq!(expand("dc11:creator"), "http://purl.org/dc/elements/1.1/creator");
        assert_eq!(expand("http://example.org/x"), "http://example.org/x");
        assert_eq!(expand("unknown:x"), "unknown:x");
    }

    #[test]
    fn subjects() {
        let graph = sample();
        assert!(graph.has_subject("http://foo"));
        assert!(!graph.has_subject("http://nope"));
    }
}
