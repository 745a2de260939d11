pub mod answers;
pub mod config;
pub mod core;
pub mod error;
pub mod knowledge_graph;
pub mod parser;
pub mod sources;
pub mod store;
pub mod templates;
pub mod utils;

pub use config::Configuration;
pub use error::{GraphError, InputError, ParseError, StoreError};
pub use knowledge_graph::{GraphAssembler, GraphBuild, KnowledgeGraph};
pub use parser::{PatternParser, PatternSet};
pub use sources::Source;
pub use templates::{QuestionTemplate, TemplateMatcher};
