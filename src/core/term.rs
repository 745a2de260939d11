use serde::{Serialize, Serializer};
use std::fmt;

/// Reserved pattern token standing for the subject minted when an answer is bound.
pub const ANSWER_MARKER: &str = "#ANSWER";

pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// One position of a compiled pattern triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    Literal(String),
    /// `prefix:local` resolved against the namespace table. The IRI is `root + local`.
    Namespaced { root: String, local: String },
    Variable { name: String, iri: String },
    /// A fixed IRI: minted answer subjects and built-in vocabulary.
    Resource(String),
    AnswerPlaceholder,
}

impl Component {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Component::AnswerPlaceholder)
    }

    /// Converts a bound component into an output term. The placeholder has no term.
    pub fn to_term(&self) -> Option<Term> {
        match self {
            Component::Literal(value) => Some(Term::Literal(value.clone())),
            Component::Namespaced { root, local } => Some(Term::Iri(format!("{}{}", root, local))),
            Component::Variable { iri, .. } => Some(Term::Iri(iri.clone())),
            Component::Resource(iri) => Some(Term::Iri(iri.clone())),
            Component::AnswerPlaceholder => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Literal(value) => write!(f, "{}", value),
            Component::Namespaced { root, local } => write!(f, "{}{}", root, local),
            Component::Variable { iri, .. } => write!(f, "{}", iri),
            Component::Resource(iri) => write!(f, "{}", iri),
            Component::AnswerPlaceholder => write!(f, "{}", ANSWER_MARKER),
        }
    }
}

/// A compiled triple line. Lines are not arity-checked, so a statement may carry
/// fewer or more than three components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternTriple {
    pub components: Vec<Component>,
}

impl PatternTriple {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn has_placeholder(&self) -> bool {
        self.components.iter().any(Component::is_placeholder)
    }

    /// Copy of this triple with every placeholder replaced by `subject`.
    pub fn substitute(&self, subject: &Component) -> Self {
        let components = self
            .components
            .iter()
            .map(|c| if c.is_placeholder() { subject.clone() } else { c.clone() })
            .collect();
        Self { components }
    }

    pub fn resolve(&self) -> Option<RdfTriple> {
        let terms = self
            .components
            .iter()
            .map(Component::to_term)
            .collect::<Option<Vec<_>>>()?;
        Some(RdfTriple { terms })
    }
}

/// An output term: either an IRI or a plain literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(String),
    Literal(String),
}

impl Term {
    pub fn as_str(&self) -> &str {
        match self {
            Term::Iri(value) | Term::Literal(value) => value,
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully bound statement, ready for output.
///
/// Serializes as a JSON array of the terms' string forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RdfTriple {
    pub terms: Vec<Term>,
}

impl RdfTriple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self { terms: vec![subject, predicate, object] }
    }

    pub fn subject(&self) -> Option<&Term> {
        self.terms.first()
    }

    pub fn predicate(&self) -> Option<&Term> {
        self.terms.get(1)
    }

    pub fn object(&self) -> Option<&Term> {
        self.terms.get(2)
    }

    /// `Some((s, p, o))` only for statements with exactly three terms.
    pub fn as_spo(&self) -> Option<(&Term, &Term, &Term)> {
        match self.terms.as_slice() {
            [s, p, o] => Some((s, p, o)),
            _ => None,
        }
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.terms.iter().map(|t| t.as_str().to_string()).collect()
    }

    pub fn to_ntriple(&self) -> String {
        let rendered: Vec<String> = self
            .terms
            .iter()
            .map(|t| match t {
                Term::Iri(iri) => format!("<{}>", iri),
                Term::Literal(value) => format!("\"{}\"", value.replace('"', "\\\"")),
            })
            .collect();
        format!("{} .", rendered.join(" "))
    }
}

impl Serialize for RdfTriple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.terms.iter().map(Term::as_str))
    }
}

impl fmt::Display for RdfTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_strings().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_replaces_every_placeholder() {
        let triple = PatternTriple::new(vec![
            Component::AnswerPlaceholder,
            Component::Resource(RDF_TYPE.to_string()),
            Component::AnswerPlaceholder,
        ]);
        let subject = Component::Resource("http://example_data.org/answer/0".to_string());

        let bound = triple.substitute(&subject);
        assert!(!bound.has_placeholder());
        assert_eq!(bound.components[0], subject);
        assert_eq!(bound.components[2], subject);
    }

    #[test]
    fn test_resolve_rejects_placeholder() {
        let triple = PatternTriple::new(vec![
            Component::Namespaced { root: "http://example.org/".to_string(), local: "hasProcess".to_string() },
            Component::AnswerPlaceholder,
        ]);
        assert!(triple.resolve().is_none());
    }

    #[test]
    fn test_serializes_as_string_array() {
        let triple = RdfTriple::new(
            Term::Iri("http://example.org/a".to_string()),
            Term::Iri(RDFS_LABEL.to_string()),
            Term::Literal("Milling".to_string()),
        );
        let json = serde_json::to_string(&triple).unwrap();
        assert_eq!(
            json,
            r#"["http://example.org/a","http://www.w3.org/2000/01/rdf-schema#label","Milling"]"#
        );
    }
}
