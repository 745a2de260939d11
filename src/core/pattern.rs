use tracing::debug;

use crate::answers::Answer;
use crate::core::term::{Component, PatternTriple, RdfTriple, RDFS_LABEL};

pub const DEFAULT_SUBJECT_BASE: &str = "http://example_data.org/answer/";

/// Mints answer subjects from a monotonically increasing counter.
///
/// One minter lives for one build request, so identifiers are reproducible for
/// identical input and never reused within a request.
#[derive(Debug, Clone)]
pub struct SubjectMinter {
    base: String,
    next: u64,
}

impl SubjectMinter {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into(), next: 0 }
    }

    pub fn mint(&mut self) -> String {
        let iri = format!("{}{}", self.base, self.next);
        self.next += 1;
        iri
    }

    pub fn minted(&self) -> u64 {
        self.next
    }
}

impl Default for SubjectMinter {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECT_BASE)
    }
}

/// An ordered list of compiled triples for one pattern block.
///
/// Binding appends to the list; the original template triples are kept, so
/// binding the same answer twice emits a second set of triples with new subjects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriplePattern {
    triples: Vec<PatternTriple>,
}

impl TriplePattern {
    pub fn new(triples: Vec<PatternTriple>) -> Self {
        Self { triples }
    }

    pub fn triples(&self) -> &[PatternTriple] {
        &self.triples
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Binds every answer-detail of `answer` that has knowledge objects and returns
    /// the number of triples appended.
    pub fn bind(&mut self, answer: &Answer, minter: &mut SubjectMinter) -> usize {
        let templated: Vec<&PatternTriple> =
            self.triples.iter().filter(|t| t.has_placeholder()).collect();

        let mut emitted = Vec::new();
        for detail in &answer.final_answer {
            // Details without knowledge objects have no graph representation yet.
            if !detail.has_knowledge_objects() {
                debug!("Skipping answer detail {} without knowledge objects", detail.id);
                continue;
            }

            let subject = Component::Resource(minter.mint());
            emitted.push(PatternTriple::new(vec![
                subject.clone(),
                Component::Resource(RDFS_LABEL.to_string()),
                Component::Literal(detail.textual_representation.clone()),
            ]));
            emitted.extend(templated.iter().map(|t| t.substitute(&subject)));
        }

        let count = emitted.len();
        self.triples.extend(emitted);
        count
    }

    /// Triples without an answer placeholder, in emission order.
    pub fn resolved_triples(&self) -> Vec<RdfTriple> {
        self.triples.iter().filter_map(PatternTriple::resolve).collect()
    }
}
