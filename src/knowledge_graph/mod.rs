pub mod assembler;
pub mod dot;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::config::{LinkedFormat, OutputMode, OutputSettings};
use crate::core::RdfTriple;
use crate::error::GraphResult;
use crate::parser::NamespaceTable;
use crate::utils::serialization::{deduplicate, RdfSerializer};

pub use assembler::{BuildReport, GraphAssembler, GraphBuild};

/// The triples collected by one build, in emission order and with duplicates.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    triples: Vec<RdfTriple>,
    namespaces: NamespaceTable,
}

impl KnowledgeGraph {
    pub fn new(namespaces: NamespaceTable) -> Self {
        Self {
            triples: Vec::new(),
            namespaces,
        }
    }

    pub fn add_triples(&mut self, triples: Vec<RdfTriple>) {
        debug!("Collected {} triples", triples.len());
        self.triples.extend(triples);
    }

    pub fn triples(&self) -> &[RdfTriple] {
        &self.triples
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// First occurrence of every distinct triple, in emission order.
    pub fn deduplicated(&self) -> Vec<RdfTriple> {
        deduplicate(&self.triples)
    }

    pub fn statistics(&self) -> KnowledgeGraphStats {
        let unique = self.deduplicated();

        let mut unique_subjects = HashSet::new();
        let mut unique_predicates = HashSet::new();
        let mut unique_objects = HashSet::new();

        for triple in &unique {
            if let Some(subject) = triple.subject() {
                unique_subjects.insert(subject);
            }
            if let Some(predicate) = triple.predicate() {
                unique_predicates.insert(predicate);
            }
            if let Some(object) = triple.object() {
                unique_objects.insert(object);
            }
        }

        KnowledgeGraphStats {
            collected_triples: self.triples.len(),
            total_triples: unique.len(),
            unique_subjects: unique_subjects.len(),
            unique_predicates: unique_predicates.len(),
            unique_objects: unique_objects.len(),
        }
    }

    pub fn to_plain_json(&self, pretty: bool) -> GraphResult<String> {
        RdfSerializer::new().pretty(pretty).serialize_plain(&self.triples)
    }

    pub fn to_linked(&self, format: LinkedFormat, pretty: bool) -> GraphResult<String> {
        RdfSerializer::new()
            .with_namespaces(&self.namespaces)
            .pretty(pretty)
            .serialize_linked(&self.triples, format)
    }

    pub fn to_dot(&self) -> String {
        dot::render_dot(&self.deduplicated())
    }

    pub fn render(&self, output: &OutputSettings) -> GraphResult<String> {
        match output.mode {
            OutputMode::Linked => self.to_linked(output.format, output.pretty),
            OutputMode::Plain => self.to_plain_json(output.pretty),
            OutputMode::Dot => Ok(self.to_dot()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraphStats {
    pub collected_triples: usize,
    pub total_triples: usize,
    pub unique_subjects: usize,
    pub unique_predicates: usize,
    pub unique_objects: usize,
}

impl std::fmt::Display for KnowledgeGraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,
            "Knowledge Graph Statistics:\n\
             Collected Triples: {}\n\
             Total Triples: {}\n\
             Unique Subjects: {}\n\
             Unique Predicates: {}\n\
             Unique Objects: {}",
            self.collected_triples,
            self.total_triples,
            self.unique_subjects,
            self.unique_predicates,
            self.unique_objects
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Term;

    fn triple(s: &str, p: &str, o: &str) -> RdfTriple {
        RdfTriple::new(
            Term::Iri(s.to_string()),
            Term::Iri(p.to_string()),
            Term::Literal(o.to_string()),
        )
    }

    #[test]
    fn test_statistics_count_distinct_triples() {
        let mut graph = KnowledgeGraph::default();
        graph.add_triples(vec![
            triple("http://x.org/a", "http://x.org/p", "1"),
            triple("http://x.org/a", "http://x.org/p", "1"),
            triple("http://x.org/b", "http://x.org/p", "2"),
        ]);

        let stats = graph.statistics();
        assert_eq!(stats.collected_triples, 3);
        assert_eq!(stats.total_triples, 2);
        assert_eq!(stats.unique_subjects, 2);
        assert_eq!(stats.unique_predicates, 1);
        assert_eq!(stats.unique_objects, 2);
        assert_eq!(graph.deduplicated().len(), 2);
    }

    #[test]
    fn test_render_dispatches_on_mode() {
        let mut graph = KnowledgeGraph::default();
        graph.add_triples(vec![triple("http://x.org/a", "http://x.org/p", "1")]);

        let plain = OutputSettings { mode: OutputMode::Plain, format: LinkedFormat::JsonLd, pretty: false };
        assert_eq!(graph.render(&plain).unwrap(), r#"[["http://x.org/a","http://x.org/p","1"]]"#);

        let dot = OutputSettings { mode: OutputMode::Dot, ..plain.clone() };
        assert!(graph.render(&dot).unwrap().starts_with("digraph {"));

        let linked = OutputSettings { mode: OutputMode::Linked, format: LinkedFormat::NTriples, pretty: false };
        assert_eq!(graph.render(&linked).unwrap(), "<http://x.org/a> <http://x.org/p> \"1\" .\n");
    }
}
