use rio_api::formatter::TriplesFormatter;
use rio_api::model::{Literal, NamedNode, Triple};
use rio_turtle::{NTriplesFormatter, TurtleFormatter};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

use crate::config::LinkedFormat;
use crate::core::{RdfTriple, Term, RDF_TYPE};
use crate::error::{GraphError, GraphResult};
use crate::parser::NamespaceTable;

const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
const GEN_DELIMS: [char; 7] = [':', '/', '?', '#', '[', ']', '@'];

/// Serializes resolved triples as linked data or as a plain JSON triple list.
pub struct RdfSerializer {
    prefixes: Vec<(String, String)>,
    pretty: bool,
}

impl Default for RdfSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl RdfSerializer {
    pub fn new() -> Self {
        Self {
            prefixes: vec![
                ("rdf".to_string(), RDF_NS.to_string()),
                ("rdfs".to_string(), RDFS_NS.to_string()),
            ],
            pretty: true,
        }
    }

    /// Adds the prefixes declared in a pattern file, used for compact JSON-LD keys.
    pub fn with_namespaces(mut self, namespaces: &NamespaceTable) -> Self {
        for (prefix, root) in namespaces.iter() {
            self.prefixes.retain(|(p, _)| p != prefix);
            self.prefixes.push((prefix.to_string(), root.to_string()));
        }
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn serialize_linked(&self, triples: &[RdfTriple], format: LinkedFormat) -> GraphResult<String> {
        let statements = rdf_statements(triples)?;
        match format {
            LinkedFormat::JsonLd => self.serialize_json_ld(&statements),
            LinkedFormat::Turtle => serialize_turtle(&statements),
            LinkedFormat::NTriples => serialize_ntriples(&statements),
            LinkedFormat::RdfXml => serialize_rdf_xml(&statements),
        }
    }

    /// JSON array of `[subject, predicate, object]` string arrays, duplicates removed.
    pub fn serialize_plain(&self, triples: &[RdfTriple]) -> GraphResult<String> {
        let rows = deduplicate_plain(triples);
        let result = if self.pretty {
            serde_json::to_string_pretty(&rows)
        } else {
            serde_json::to_string(&rows)
        };
        result.map_err(|e| serialization_error("json", e))
    }

    fn serialize_json_ld(&self, statements: &[(&Term, &Term, &Term)]) -> GraphResult<String> {
        let mut context = Map::new();
        for (prefix, root) in &self.prefixes {
            context.insert(prefix.clone(), Value::String(root.clone()));
        }

        let mut nodes: Vec<Map<String, Value>> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for &(subject, predicate, object) in statements {
            let position = *positions.entry(subject.as_str()).or_insert_with(|| {
                let mut node = Map::new();
                node.insert("@id".to_string(), Value::String(subject.as_str().to_string()));
                nodes.push(node);
                nodes.len() - 1
            });

            let (key, value) = if predicate.as_str() == RDF_TYPE && object.is_iri() {
                ("@type".to_string(), Value::String(self.compact(object.as_str())))
            } else {
                let value = match object {
                    Term::Iri(iri) => json!({ "@id": iri }),
                    Term::Literal(literal) => Value::String(literal.clone()),
                };
                (self.compact(predicate.as_str()), value)
            };

            let node = &mut nodes[position];
            match node.get_mut(&key) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    node.insert(key, value);
                }
            }
        }

        let document = json!({
            "@context": context,
            "@graph": nodes.into_iter().map(Value::Object).collect::<Vec<_>>(),
        });

        let result = if self.pretty {
            serde_json::to_string_pretty(&document)
        } else {
            serde_json::to_string(&document)
        };
        result.map_err(|e| serialization_error("json-ld", e))
    }

    /// Compacts against roots ending in a gen-delim only; other roots are not
    /// JSON-LD prefixes and would change the expanded IRI.
    fn compact(&self, iri: &str) -> String {
        self.prefixes
            .iter()
            .filter(|(_, root)| root.ends_with(GEN_DELIMS))
            .filter(|(_, root)| iri.len() > root.len() && iri.starts_with(root.as_str()))
            .max_by_key(|(_, root)| root.len())
            .map(|(prefix, root)| format!("{}:{}", prefix, &iri[root.len()..]))
            .unwrap_or_else(|| iri.to_string())
    }
}

/// Removes exact duplicates, keeping the first occurrence.
pub fn deduplicate(triples: &[RdfTriple]) -> Vec<RdfTriple> {
    let mut seen = HashSet::new();
    triples
        .iter()
        .filter(|t| seen.insert(*t))
        .cloned()
        .collect()
}

/// Renders triples to strings and removes duplicates of the rendered form.
pub fn deduplicate_plain(triples: &[RdfTriple]) -> Vec<Vec<String>> {
    let mut seen = HashSet::new();
    triples
        .iter()
        .map(RdfTriple::to_strings)
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

/// Problems that keep triples from being written as RDF, one entry per triple.
pub fn validate_rdf_triples(triples: &[RdfTriple]) -> Vec<String> {
    triples
        .iter()
        .enumerate()
        .filter_map(|(i, triple)| rdf_problem(triple).map(|reason| format!("Triple {}: {}: {}", i, reason, triple)))
        .collect()
}

fn rdf_problem(triple: &RdfTriple) -> Option<&'static str> {
    match triple.as_spo() {
        None => Some("statement does not have exactly three terms"),
        Some((subject, _, _)) if !subject.is_iri() => Some("literal in subject position"),
        Some((_, predicate, _)) if !predicate.is_iri() => Some("literal in predicate position"),
        Some((s, p, o)) if [s, p, o].iter().any(|t| t.is_iri() && !is_absolute_iri(t.as_str())) => {
            Some("malformed IRI")
        }
        Some(_) => None,
    }
}

/// An absolute IRI that can be written between `<` and `>` without escaping.
fn is_absolute_iri(iri: &str) -> bool {
    let writable = !iri
        .chars()
        .any(|c| c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\'));
    writable && url::Url::parse(iri).is_ok()
}

/// Checks every triple and returns the deduplicated `(s, p, o)` views.
fn rdf_statements(triples: &[RdfTriple]) -> GraphResult<Vec<(&Term, &Term, &Term)>> {
    let mut seen = HashSet::new();
    let mut statements = Vec::with_capacity(triples.len());
    for triple in triples {
        if let Some(reason) = rdf_problem(triple) {
            return Err(GraphError::NotRdf { statement: triple.to_string(), reason });
        }
        if let Some(spo) = triple.as_spo() {
            if seen.insert(spo) {
                statements.push(spo);
            }
        }
    }
    Ok(statements)
}

fn rio_triple<'a>(subject: &'a Term, predicate: &'a Term, object: &'a Term) -> Triple<'a> {
    Triple {
        subject: NamedNode { iri: subject.as_str() }.into(),
        predicate: NamedNode { iri: predicate.as_str() },
        object: match object {
            Term::Iri(iri) => NamedNode { iri: iri.as_str() }.into(),
            Term::Literal(value) => Literal::Simple { value: value.as_str() }.into(),
        },
    }
}

fn serialize_ntriples(statements: &[(&Term, &Term, &Term)]) -> GraphResult<String> {
    let mut formatter = NTriplesFormatter::new(Vec::new());
    for &(s, p, o) in statements {
        formatter
            .format(&rio_triple(s, p, o))
            .map_err(|e| serialization_error("n-triples", e))?;
    }
    let bytes = formatter.finish().map_err(|e| serialization_error("n-triples", e))?;
    String::from_utf8(bytes).map_err(|e| serialization_error("n-triples", e))
}

fn serialize_turtle(statements: &[(&Term, &Term, &Term)]) -> GraphResult<String> {
    let mut formatter = TurtleFormatter::new(Vec::new());
    for &(s, p, o) in statements {
        formatter
            .format(&rio_triple(s, p, o))
            .map_err(|e| serialization_error("turtle", e))?;
    }
    let bytes = formatter.finish().map_err(|e| serialization_error("turtle", e))?;
    String::from_utf8(bytes).map_err(|e| serialization_error("turtle", e))
}

fn serialize_rdf_xml(statements: &[(&Term, &Term, &Term)]) -> GraphResult<String> {
    let mut output = String::new();
    output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    output.push_str(&format!("<rdf:RDF xmlns:rdf=\"{}\">\n", RDF_NS));

    // Group by subject, keeping first-seen order.
    let mut subjects: Vec<(&str, Vec<(&Term, &Term)>)> = Vec::new();
    for &(subject, predicate, object) in statements {
        match subjects.iter_mut().find(|(s, _)| *s == subject.as_str()) {
            Some((_, properties)) => properties.push((predicate, object)),
            None => subjects.push((subject.as_str(), vec![(predicate, object)])),
        }
    }

    for (subject, properties) in subjects {
        output.push_str(&format!(
            "  <rdf:Description rdf:about=\"{}\">\n",
            html_escape::encode_double_quoted_attribute(subject)
        ));

        for (predicate, object) in properties {
            let (namespace, local) = split_qname(predicate.as_str()).ok_or_else(|| GraphError::NotRdf {
                statement: format!("{} {} {}", subject, predicate, object),
                reason: "predicate has no XML local name",
            })?;
            let namespace = html_escape::encode_double_quoted_attribute(namespace);

            match object {
                Term::Iri(iri) => output.push_str(&format!(
                    "    <{} xmlns=\"{}\" rdf:resource=\"{}\"/>\n",
                    local,
                    namespace,
                    html_escape::encode_double_quoted_attribute(iri)
                )),
                Term::Literal(value) => output.push_str(&format!(
                    "    <{} xmlns=\"{}\">{}</{}>\n",
                    local,
                    namespace,
                    html_escape::encode_text(value),
                    local
                )),
            }
        }

        output.push_str("  </rdf:Description>\n");
    }

    output.push_str("</rdf:RDF>\n");
    Ok(output)
}

/// Splits an IRI after its last `#` or `/` into namespace and XML local name.
fn split_qname(iri: &str) -> Option<(&str, &str)> {
    let cut = iri.rfind(|c| c == '#' || c == '/')? + 1;
    let (namespace, local) = iri.split_at(cut);
    let mut chars = local.chars();
    let first = chars.next()?;
    let valid_start = first.is_alphabetic() || first == '_';
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid_start && valid_rest {
        Some((namespace, local))
    } else {
        None
    }
}

fn serialization_error<E>(format: &'static str, error: E) -> GraphError
where
    E: std::error::Error + Send + Sync + 'static,
{
    GraphError::Serialization { format, source: Box::new(error) }
}
