use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{Subject, Term as OxTerm};
use tracing::{debug, warn};

use crate::domain::RdfSyntax;
use crate::error::IndexError;
use crate::graph::{Graph, Quad, Term};

pub const DEFAULT_MAX_TRIPLES: usize = 40_000;
const SNIFF_BYTES: u64 = 100 * 1024;

/// How a file is turned into quads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// In-process parser.
    Primary,
    /// `rapper` converts the file to N-Triples, which is then read in-process.
    ExternalProcess,
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseStrategy::Primary => write!(f, "primary"),
            ParseStrategy::ExternalProcess => write!(f, "rapper"),
        }
    }
}

/// Reads RDF files into bounded [`Graph`]s.
///
/// Only the first `max_triples` quads of a file are kept, so metadata of very
/// large ontologies may be incomplete.
#[derive(Debug, Clone)]
pub struct RdfLoader {
    rapper: Option<PathBuf>,
    max_triples: usize,
}

impl RdfLoader {
    pub fn new(rapper: Option<PathBuf>, max_triples: usize) -> Self {
        Self {
            rapper,
            max_triples,
        }
    }

    /// Uses the configured rapper binary, or looks it up on `PATH`.
    pub fn detect(configured: Option<&Path>, max_triples: usize) -> Self {
        let rapper = configured
            .map(Path::to_path_buf)
            .or_else(|| find_in_path("rapper"));
        if rapper.is_none() {
            debug!("rapper not found, external parser fallback disabled");
        }
        Self::new(rapper, max_triples)
    }

    /// Same loader with a different quad cap.
    pub fn with_max_triples(&self, max_triples: usize) -> Self {
        Self {
            rapper: self.rapper.clone(),
            max_triples,
        }
    }

    pub fn max_triples(&self) -> usize {
        self.max_triples
    }

    /// Strategies in the order they are tried.
    pub fn strategies(&self) -> Vec<ParseStrategy> {
        let mut strategies = vec![ParseStrategy::Primary];
        if self.rapper.is_some() {
            strategies.push(ParseStrategy::ExternalProcess);
        }
        strategies
    }

    /// Loads a file, falling back to the next strategy on parse errors.
    ///
    /// When every strategy fails to parse the file, the result is an empty
    /// graph. Only I/O problems with the file itself are returned as errors.
    pub fn load(&self, path: &Path, hint: Option<RdfSyntax>) -> Result<Graph, IndexError> {
        let syntax = match hint {
            Some(syntax) => Some(syntax),
            None => sniff_file(path)?,
        };
        for strategy in self.strategies() {
            match self.load_with(strategy, path, syntax) {
                Ok(graph) => {
                    debug!(path = %path.display(), %strategy, quads = graph.len(), "graph loaded");
                    return Ok(graph);
                }
                Err(IndexError::Filesystem(message)) => {
                    return Err(IndexError::Filesystem(message));
                }
                Err(err) => {
                    warn!(path = %path.display(), %strategy, error = %err, "parsing failed");
                }
            }
        }
        Ok(Graph::empty())
    }

    pub fn load_with(
        &self,
        strategy: ParseStrategy,
        path: &Path,
        syntax: Option<RdfSyntax>,
    ) -> Result<Graph, IndexError> {
        match strategy {
            ParseStrategy::Primary => {
                let syntax = syntax.ok_or_else(|| {
                    IndexError::Parse(format!("unknown RDF format: {}", path.display()))
                })?;
                let file = File::open(path).map_err(|err| {
                    IndexError::Filesystem(format!("open {}: {err}", path.display()))
                })?;
                self.parse_reader(BufReader::new(file), syntax)
            }
            ParseStrategy::ExternalProcess => self.load_with_rapper(path, syntax),
        }
    }

    /// Parses in-process. Stops after `max_triples` quads; any syntax error
    /// fails the whole read.
    pub fn parse_reader<R: Read>(&self, reader: R, syntax: RdfSyntax) -> Result<Graph, IndexError> {
        let format = primary_format(syntax).ok_or_else(|| {
            IndexError::Parse(format!("{syntax} is not supported by the primary parser"))
        })?;
        let mut quads = Vec::new();
        for quad in RdfParser::from_format(format).for_reader(reader) {
            let quad = quad.map_err(|err| IndexError::Parse(err.to_string()))?;
            if let Some(quad) = convert_quad(quad) {
                quads.push(quad);
            }
            if quads.len() >= self.max_triples {
                break;
            }
        }
        Ok(Graph::new(quads))
    }

    fn load_with_rapper(&self, path: &Path, syntax: Option<RdfSyntax>) -> Result<Graph, IndexError> {
        let rapper = self
            .rapper
            .as_ref()
            .ok_or_else(|| IndexError::MissingTool("rapper".to_string()))?;
        let output = tempfile::Builder::new()
            .prefix("ontology-index-rapper")
            .suffix(".nt")
            .tempfile()
            .map_err(|err| IndexError::Filesystem(err.to_string()))?;
        let stdout = output
            .reopen()
            .map_err(|err| IndexError::Filesystem(err.to_string()))?;

        let mut cmd = Command::new(rapper);
        cmd.arg("-q");
        match syntax {
            Some(syntax) => cmd.args(["-i", syntax.rapper_name()]),
            None => cmd.arg("-g"),
        };
        cmd.args(["-o", "ntriples"]).arg(path);
        let result = cmd
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| IndexError::Parse(format!("run {}: {err}", rapper.display())))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("rapper failed on {}", path.display())
            } else {
                stderr
            };
            return Err(IndexError::Parse(message));
        }

        let converted = File::open(output.path())
            .map_err(|err| IndexError::Filesystem(err.to_string()))?;
        let graph = self
            .parse_reader(BufReader::new(converted), RdfSyntax::NTriples)
            .map_err(|err| IndexError::Parse(format!("rapper output: {err}")))?;
        if graph.is_empty() {
            return Err(IndexError::Parse(format!(
                "rapper produced no triples for {}",
                path.display()
            )));
        }
        Ok(graph)
    }
}

/// Sniffs the syntax from the first 100 KiB of a file.
pub fn sniff_file(path: &Path) -> Result<Option<RdfSyntax>, IndexError> {
    let file = File::open(path)
        .map_err(|err| IndexError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut head = Vec::new();
    file.take(SNIFF_BYTES)
        .read_to_end(&mut head)
        .map_err(|err| IndexError::Filesystem(err.to_string()))?;
    Ok(RdfSyntax::sniff(&head))
}

fn primary_format(syntax: RdfSyntax) -> Option<RdfFormat> {
    match syntax {
        RdfSyntax::JsonLd => None,
        RdfSyntax::N3 => Some(RdfFormat::N3),
        RdfSyntax::NTriples => Some(RdfFormat::NTriples),
        RdfSyntax::RdfXml => Some(RdfFormat::RdfXml),
        RdfSyntax::Turtle => Some(RdfFormat::Turtle),
    }
}

#[allow(unreachable_patterns)]
fn convert_quad(quad: oxigraph::model::Quad) -> Option<Quad> {
    let subject = match quad.subject {
        Subject::NamedNode(node) => Term::Iri(node.into_string()),
        Subject::BlankNode(node) => Term::BlankNode(format!("_:{}", node.as_str())),
        _ => return None,
    };
    let object = match quad.object {
        OxTerm::NamedNode(node) => Term::Iri(node.into_string()),
        OxTerm::BlankNode(node) => Term::BlankNode(format!("_:{}", node.as_str())),
        OxTerm::Literal(literal) => Term::Literal {
            value: literal.value().to_string(),
            language: literal.language().map(str::to_string),
            datatype: Some(literal.datatype().as_str().to_string()),
        },
        _ => return None,
    };
    Some(Quad::new(subject, quad.predicate.into_string(), object))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const TURTLE: &str = r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix dcterms: <http://purl.org/dc/terms/> .

<http://example.org/onto> a owl:Ontology ;
    rdfs:label "Example"@en ;
    dcterms:creator _:someone .

<http://example.org/onto#Thing> a owl:Class .
"#;

    fn loader() -> RdfLoader {
        RdfLoader::new(None, DEFAULT_MAX_TRIPLES)
    }

    #[test]
    fn parses_turtle() {
        let graph = loader()
            .parse_reader(TURTLE.as_bytes(), RdfSyntax::Turtle)
            .unwrap();
        assert_eq!(graph.len(), 4);
        assert!(graph.has_instances_of_type("owl:Ontology"));
        assert_eq!(graph.label("http://example.org/onto", Some("en")), Some("Example"));
        let creators = graph.property_objects("http://example.org/onto", "dc:creator", None);
        assert!(creators[0].is_blank_node());
    }

    #[test]
    fn stops_at_max_triples() {
        let graph = RdfLoader::new(None, 2)
            .parse_reader(TURTLE.as_bytes(), RdfSyntax::Turtle)
            .unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let err = loader()
            .parse_reader("<http://a> <http://b> .".as_bytes(), RdfSyntax::NTriples)
            .unwrap_err();
        assert_matches!(err, IndexError::Parse(_));
    }

    #[test]
    fn broken_file_without_fallback_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttl");
        std::fs::write(&path, "@prefix : <http://x/> .\n:a :b ").unwrap();
        let graph = loader().load(&path, Some(RdfSyntax::Turtle)).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn load_sniffs_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onto");
        std::fs::write(&path, TURTLE).unwrap();
        let graph = loader().load(&path, None).unwrap();
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn strategies_depend_on_rapper() {
        assert_eq!(loader().strategies(), vec![ParseStrategy::Primary]);
        let with_rapper = RdfLoader::new(Some(PathBuf::from("/usr/bin/rapper")), 10);
        assert_eq!(
            with_rapper.strategies(),
            vec![ParseStrategy::Primary, ParseStrategy::ExternalProcess]
        );
    }
}
