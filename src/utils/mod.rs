pub mod serialization;

pub use serialization::{deduplicate, deduplicate_plain, validate_rdf_triples, RdfSerializer};
