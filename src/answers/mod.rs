//! Answer data as delivered by the analysis stage.
//!
//! Answers arrive unresolved ([`AnswerSource`]): answer documents name their
//! answer-details by id, and answer-details name their knowledge objects by id.
//! [`AnswerSource::resolve`] turns that into owned [`Answer`] values whose details
//! and knowledge objects are direct values. Linking answers to question templates
//! is a separate, later stage (see `templates::matcher`).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeObject {
    pub id: i64,
    pub category: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub annotation_ids: Vec<i64>,
}

/// Answer-detail record with knowledge objects referenced by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerDetailRecord {
    pub id: i64,
    pub textual_representation: String,
    #[serde(default)]
    pub question_id: i64,
    #[serde(rename = "knowledgeObject_ids", default)]
    pub knowledge_object_ids: Vec<i64>,
    #[serde(default)]
    pub context_id: i64,
    #[serde(default)]
    pub answer_source: String,
}

/// Answer document with answer-details referenced by id and question templates
/// referenced by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub final_answer: Vec<i64>,
    pub question_template: Vec<String>,
    pub final_result: String,
}

/// The full answer payload of one analysed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerSource {
    #[serde(rename = "knowledgeObjects", default)]
    pub knowledge_objects: Vec<KnowledgeObject>,
    pub answer_documents: Vec<AnswerRecord>,
    #[serde(default)]
    pub answers: Vec<AnswerDetailRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerDetail {
    pub id: i64,
    pub textual_representation: String,
    pub question_id: i64,
    pub context_id: i64,
    pub answer_source: String,
    pub knowledge_objects: Vec<KnowledgeObject>,
}

impl AnswerDetail {
    pub fn has_knowledge_objects(&self) -> bool {
        !self.knowledge_objects.is_empty()
    }
}

/// An answer with its details resolved. The question-template names are still
/// unresolved names at this stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub final_answer: Vec<AnswerDetail>,
    pub question_template: Vec<String>,
    pub final_result: String,
}

impl Answer {
    pub fn has_final_result(&self) -> bool {
        !self.final_result.is_empty()
    }

    /// Whether this answer declares both types of a question template.
    pub fn refers_to(&self, broader: &str, specific: &str) -> bool {
        self.question_template.iter().any(|name| name == broader)
            && self.question_template.iter().any(|name| name == specific)
    }
}

impl AnswerSource {
    /// Resolves id references. Ids that match nothing are dropped.
    pub fn resolve(self) -> Vec<Answer> {
        let details: Vec<AnswerDetail> = self
            .answers
            .into_iter()
            .map(|record| {
                let wanted: HashSet<i64> = record.knowledge_object_ids.iter().copied().collect();
                let knowledge_objects: Vec<KnowledgeObject> = self
                    .knowledge_objects
                    .iter()
                    .filter(|k| wanted.contains(&k.id))
                    .cloned()
                    .collect();
                if knowledge_objects.len() < wanted.len() {
                    debug!(
                        "Answer detail {} references {} unknown knowledge objects",
                        record.id,
                        wanted.len() - knowledge_objects.len()
                    );
                }
                AnswerDetail {
                    id: record.id,
                    textual_representation: record.textual_representation,
                    question_id: record.question_id,
                    context_id: record.context_id,
                    answer_source: record.answer_source,
                    knowledge_objects,
                }
            })
            .collect();

        self.answer_documents
            .into_iter()
            .map(|record| {
                let wanted: HashSet<i64> = record.final_answer.iter().copied().collect();
                let final_answer: Vec<AnswerDetail> = details
                    .iter()
                    .filter(|d| wanted.contains(&d.id))
                    .cloned()
                    .collect();
                if final_answer.len() < wanted.len() {
                    debug!(
                        "Answer for {:?} references {} unknown answer details",
                        record.question_template,
                        wanted.len() - final_answer.len()
                    );
                }
                Answer {
                    final_answer,
                    question_template: record.question_template,
                    final_result: record.final_result,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> AnswerSource {
        serde_json::from_value(json!({
            "knowledgeObjects": [
                {"id": 7, "category": "ManufacturingProcess", "labels": ["milling"], "annotation_ids": [1]},
                {"id": 8, "category": "TestMethod", "labels": ["tensile test"]}
            ],
            "answer_documents": [
                {"final_answer": [1, 2, 99], "question_template": ["ManufacturingProcess", "Process"], "final_result": "Milling"}
            ],
            "answers": [
                {"id": 2, "textual_representation": "Drilling", "question_id": 3,
                 "knowledgeObject_ids": [], "context_id": 1, "answer_source": "text"},
                {"id": 1, "textual_representation": "Milling", "question_id": 3,
                 "knowledgeObject_ids": [7, 42], "context_id": 1, "answer_source": "text"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_links_details_and_knowledge_objects() {
        let answers = source().resolve();
        assert_eq!(answers.len(), 1);

        let answer = &answers[0];
        // Detail order follows the answer-detail list, unknown id 99 is dropped.
        let ids: Vec<i64> = answer.final_answer.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 1]);

        let milling = &answer.final_answer[1];
        assert_eq!(milling.knowledge_objects.len(), 1);
        assert_eq!(milling.knowledge_objects[0].id, 7);
        assert!(!answer.final_answer[0].has_knowledge_objects());
    }

    #[test]
    fn test_refers_to_needs_both_types() {
        let answer = &source().resolve()[0];
        assert!(answer.refers_to("ManufacturingProcess", "Process"));
        assert!(!answer.refers_to("ManufacturingProcess", "Normalload"));
        assert!(answer.has_final_result());
    }
}
