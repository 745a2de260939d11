//! Graphviz rendering of a resolved triple list.
//!
//! Label triples do not become edges: their literal replaces the subject's name.
//! Type triples mark the subject as typed, which only changes its colour.

use crate::core::RdfTriple;

const LITERAL_COLOR: &str = "#66789f";
const TYPED_COLOR: &str = "#dce4f5";
const RESOURCE_COLOR: &str = "#dddddd";

struct Node {
    name: String,
    typed: bool,
}

impl Node {
    fn color(&self) -> &'static str {
        if !self.name.contains("http:") && !self.name.contains("https:") {
            LITERAL_COLOR
        } else if self.typed {
            TYPED_COLOR
        } else {
            RESOURCE_COLOR
        }
    }

    fn label(&self) -> &str {
        if self.name.contains("http") {
            ""
        } else {
            &self.name
        }
    }
}

pub fn render_dot(triples: &[RdfTriple]) -> String {
    let mut nodes: Vec<Node> = Vec::new();
    let mut edges: Vec<(&str, usize, usize)> = Vec::new();

    for triple in triples {
        if let Some((subject, predicate, object)) = triple.as_spo() {
            let from = node_index(&mut nodes, subject.as_str());
            let to = node_index(&mut nodes, object.as_str());
            edges.push((predicate.as_str(), from, to));
        }
    }

    let mut drawn = Vec::new();
    for (predicate, from, to) in edges {
        if predicate.contains("type") {
            nodes[from].typed = true;
        } else if predicate.contains("label") {
            nodes[from].name = nodes[to].name.clone();
        } else {
            drawn.push((predicate, from, to));
        }
    }

    let mut used: Vec<usize> = drawn.iter().flat_map(|&(_, from, to)| [from, to]).collect();
    used.sort_unstable();
    used.dedup();

    let id = |index: usize| used.binary_search(&index).unwrap_or(index);

    let mut output = String::from("digraph {\n");
    for (position, &index) in used.iter().enumerate() {
        let node = &nodes[index];
        let label = node.label();
        output.push_str(&format!(
            "  n{} [label=\"{}\", color=\"{}\", shape={}];\n",
            position,
            escape(label),
            node.color(),
            if label.is_empty() { "dot" } else { "triangle" }
        ));
    }
    for (predicate, from, to) in drawn {
        let edge_label = predicate.rsplit('/').next().unwrap_or(predicate);
        output.push_str(&format!(
            "  n{} -> n{} [label=\"{}\", color=gray];\n",
            id(from),
            id(to),
            escape(edge_label)
        ));
    }
    output.push('}');
    output
}

fn node_index(nodes: &mut Vec<Node>, name: &str) -> usize {
    match nodes.iter().position(|n| n.name == name) {
        Some(index) => index,
        None => {
            nodes.push(Node { name: name.to_string(), typed: false });
            nodes.len() - 1
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Term, RDFS_LABEL, RDF_TYPE};

    fn iri(value: &str) -> Term {
        Term::Iri(value.to_string())
    }

    #[test]
    fn test_labels_rename_nodes_and_types_colour_them() {
        let answer = "http://example_data.org/answer/0";
        let triples = vec![
            RdfTriple::new(iri(answer), iri(RDFS_LABEL), Term::Literal("Milling".to_string())),
            RdfTriple::new(iri("http://example.org/Part"), iri(RDF_TYPE), iri("http://example.org/Component")),
            RdfTriple::new(iri("http://example.org/Part"), iri("http://example.org/hasProcess"), iri(answer)),
        ];

        let dot = render_dot(&triples);
        assert!(dot.starts_with("digraph {\n"));
        assert!(dot.ends_with('}'));
        // The answer node carries its label, the part node is typed.
        assert!(dot.contains("[label=\"Milling\", color=\"#66789f\", shape=triangle]"));
        assert!(dot.contains("[label=\"\", color=\"#dce4f5\", shape=dot]"));
        assert!(dot.contains("[label=\"hasProcess\", color=gray]"));
        assert!(!dot.contains("rdf-schema#label"));
        assert_eq!(dot.matches("->").count(), 1);
        assert!(dot.contains("  n1 -> n0 [label=\"hasProcess\""));
    }

    #[test]
    fn test_empty_graph() {
        assert_eq!(render_dot(&[]), "digraph {\n}");
    }
}
