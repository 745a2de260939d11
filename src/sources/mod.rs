//! Loading of the three build inputs: answers, question templates and patterns.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::borrow::Cow;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::answers::AnswerSource;
use crate::error::{GraphResult, InputError};
use crate::parser::{PatternParser, PatternSet};
use crate::templates::QuestionTemplate;

/// Where an input comes from: a file, inline text, or an already parsed document.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    Text(String),
    Value(serde_json::Value),
}

impl Source {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Source::File(path.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Source::Text(text.into())
    }

    pub fn value(value: serde_json::Value) -> Self {
        Source::Value(value)
    }

    fn read_text(&self, what: &'static str) -> Result<Cow<'_, str>, InputError> {
        match self {
            Source::File(path) => {
                debug!("Reading {} from {}", what, path.display());
                fs::read_to_string(path)
                    .map(Cow::Owned)
                    .map_err(|source| InputError::Io { what, path: path.clone(), source })
            }
            Source::Text(text) => Ok(Cow::Borrowed(text.as_str())),
            Source::Value(_) => Err(InputError::UnsupportedSource { what, given: "a JSON value" }),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, what: &'static str) -> Result<T, InputError> {
        let parsed = match self {
            Source::Value(value) => T::deserialize(value),
            _ => serde_json::from_str(&self.read_text(what)?),
        };
        parsed.map_err(|source| InputError::Json { what, source })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateDocument {
    List(Vec<QuestionTemplate>),
    Wrapped { templates: Vec<QuestionTemplate> },
}

pub fn load_answers(source: &Source) -> Result<AnswerSource, InputError> {
    let answers: AnswerSource = source.read_json("answer source")?;
    debug!(
        "Loaded {} answer documents, {} answer details, {} knowledge objects",
        answers.answer_documents.len(),
        answers.answers.len(),
        answers.knowledge_objects.len()
    );
    Ok(answers)
}

/// Accepts a bare JSON array of templates or an object with a `templates` array.
pub fn load_templates(source: &Source) -> Result<Vec<QuestionTemplate>, InputError> {
    let templates = match source.read_json::<TemplateDocument>("question templates")? {
        TemplateDocument::List(templates) => templates,
        TemplateDocument::Wrapped { templates } => templates,
    };
    debug!("Loaded {} question templates", templates.len());
    Ok(templates)
}

pub fn load_patterns(source: &Source, parser: &PatternParser) -> GraphResult<PatternSet> {
    let set = match source {
        Source::File(path) => parser.parse_file(path)?,
        _ => parser.parse_str(&source.read_text("pattern file")?)?,
    };
    Ok(set)
}
