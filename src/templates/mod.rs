pub mod matcher;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use matcher::{AnswerId, BoundTemplate, LinkedAnswer, Matching, TemplateId, TemplateMatcher};

/// A rule describing a class of question and the answers it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionTemplate {
    #[serde(rename = "broader_questionType")]
    pub broader_question_type: String,
    #[serde(rename = "specific_questionType")]
    pub specific_question_type: String,
    #[serde(default)]
    pub weak_dependency_to: BTreeSet<String>,
    #[serde(default)]
    pub strong_dependency_to: BTreeSet<String>,
    #[serde(default)]
    pub question: Vec<String>,
    #[serde(rename = "expectedAnswerSpace", default)]
    pub expected_answer_space: Vec<String>,
    #[serde(rename = "preSearchSpace", default)]
    pub pre_search_space: Vec<String>,
    #[serde(rename = "normalState", default)]
    pub normal_state: String,
    #[serde(default)]
    pub dependend_from_variables: Vec<String>,
}

impl QuestionTemplate {
    pub fn new(broader: impl Into<String>, specific: impl Into<String>) -> Self {
        Self {
            broader_question_type: broader.into(),
            specific_question_type: specific.into(),
            weak_dependency_to: BTreeSet::new(),
            strong_dependency_to: BTreeSet::new(),
            question: Vec::new(),
            expected_answer_space: Vec::new(),
            pre_search_space: Vec::new(),
            normal_state: String::new(),
            dependend_from_variables: Vec::new(),
        }
    }

    /// `broader/specific`, used in logs and reports.
    pub fn identity(&self) -> String {
        format!("{}/{}", self.broader_question_type, self.specific_question_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_source_field_names() {
        let template: QuestionTemplate = serde_json::from_value(json!({
            "broader_questionType": "OperationalParameter",
            "specific_questionType": "Normalload",
            "weak_dependency_to": ["ManufacturingProcess", "ManufacturingProcess"],
            "strong_dependency_to": [],
            "question": ["Which normal load was applied?"],
            "expectedAnswerSpace": ["<OperationalParameter>"],
            "preSearchSpace": ["load"],
            "normalState": "",
            "dependend_from_variables": []
        }))
        .unwrap();

        assert_eq!(template.identity(), "OperationalParameter/Normalload");
        assert_eq!(template.weak_dependency_to.len(), 1);
        assert_eq!(template.expected_answer_space, vec!["<OperationalParameter>"]);
    }

    #[test]
    fn test_optional_fields_default() {
        let template: QuestionTemplate = serde_json::from_value(json!({
            "broader_questionType": "ManufacturingProcess",
            "specific_questionType": "Process"
        }))
        .unwrap();
        assert_eq!(template, QuestionTemplate::new("ManufacturingProcess", "Process"));
    }
}
