pub mod pattern;
pub mod term;

pub use pattern::{SubjectMinter, TriplePattern};
pub use term::{Component, PatternTriple, RdfTriple, Term, ANSWER_MARKER, RDFS_LABEL, RDF_TYPE};
