use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::answers::AnswerSource;
use crate::config::{IdentifierSettings, OutputSettings};
use crate::core::SubjectMinter;
use crate::error::GraphResult;
use crate::knowledge_graph::{KnowledgeGraph, KnowledgeGraphStats};
use crate::parser::{PatternParser, PatternSet};
use crate::sources::{load_answers, load_patterns, load_templates, Source};
use crate::templates::{QuestionTemplate, TemplateMatcher};

/// Summary of one assembly run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub id: String,
    pub built_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
    pub templates: usize,
    pub answers: usize,
    pub answered_templates: usize,
    pub bindings: usize,
    pub minted_subjects: u64,
    pub stats: KnowledgeGraphStats,
}

impl std::fmt::Display for BuildReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Build {} ({})", self.id, self.built_at.to_rfc3339())?;
        writeln!(f, "Processing Time: {:.3}s", self.processing_time_seconds)?;
        writeln!(
            f,
            "Templates: {} ({} answered), Answers: {}",
            self.templates, self.answered_templates, self.answers
        )?;
        writeln!(f, "Bindings: {}, Minted Subjects: {}", self.bindings, self.minted_subjects)?;
        write!(f, "{}", self.stats)
    }
}

#[derive(Debug, Clone)]
pub struct GraphBuild {
    pub graph: KnowledgeGraph,
    pub report: BuildReport,
}

/// Drives one build: compile patterns, load and match answers, bind, collect.
///
/// All tables, patterns and minted identifiers belong to a single call; nothing
/// carries over between builds.
#[derive(Debug, Clone, Default)]
pub struct GraphAssembler {
    identifiers: IdentifierSettings,
}

impl GraphAssembler {
    pub fn new(identifiers: IdentifierSettings) -> Self {
        Self { identifiers }
    }

    pub fn parser(&self) -> PatternParser {
        PatternParser::new().with_variable_base(self.identifiers.variable_base.clone())
    }

    pub fn assemble(&self, answers: &Source, templates: &Source, patterns: &Source) -> GraphResult<GraphBuild> {
        let patterns = load_patterns(patterns, &self.parser())?;
        let answers = load_answers(answers)?;
        let templates = load_templates(templates)?;
        Ok(self.assemble_parts(answers, templates, patterns))
    }

    pub fn assemble_parts(
        &self,
        answers: AnswerSource,
        templates: Vec<QuestionTemplate>,
        mut patterns: PatternSet,
    ) -> GraphBuild {
        let start_time = Instant::now();
        let mut minter = SubjectMinter::new(self.identifiers.subject_base.clone());
        let mut graph = KnowledgeGraph::new(patterns.namespaces().clone());

        let matching = TemplateMatcher::link(&patterns, templates, answers.resolve());
        let mut bindings = 0;

        for bound in matching.answered() {
            if bound.patterns.is_empty() {
                warn!("Answered template {} has no triple patterns", bound.template.identity());
                continue;
            }
            for &pattern_id in &bound.patterns {
                for &answer_id in &bound.answers {
                    let pattern = patterns.pattern_mut(pattern_id);
                    let emitted = pattern.bind(matching.answer(answer_id), &mut minter);
                    debug!(
                        "Bound answer {} to a pattern of {}: {} triples",
                        answer_id.index(),
                        bound.template.identity(),
                        emitted
                    );
                    graph.add_triples(pattern.resolved_triples());
                    bindings += 1;
                }
            }
        }

        let stats = graph.statistics();
        let report = BuildReport {
            id: Uuid::new_v4().to_string(),
            built_at: Utc::now(),
            processing_time_seconds: start_time.elapsed().as_secs_f64(),
            templates: matching.templates.len(),
            answers: matching.answers.len(),
            answered_templates: matching.answered().count(),
            bindings,
            minted_subjects: minter.minted(),
            stats,
        };

        info!(
            "Assembled {} unique triples from {} bindings in {:.3}s",
            report.stats.total_triples, report.bindings, report.processing_time_seconds
        );

        GraphBuild { graph, report }
    }

    /// Assembles and serializes in one step.
    pub fn build(
        &self,
        answers: &Source,
        templates: &Source,
        patterns: &Source,
        output: &OutputSettings,
    ) -> GraphResult<String> {
        self.assemble(answers, templates, patterns)?.graph.render(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LinkedFormat, OutputMode};
    use crate::error::{GraphError, ParseError};
    use serde_json::json;

    const PATTERNS: &str = "NAMESPACES\nex: <http://example.org/>\n\nIF ManufacturingProcess:\nex:Part ex:hasProcess #ANSWER .\n\n";

    fn answers(final_result: &str) -> Source {
        Source::value(json!({
            "knowledgeObjects": [{"id": 7, "category": "Process", "labels": ["Milling"], "annotation_ids": []}],
            "answer_documents": [{
                "final_answer": [1, 2],
                "question_template": ["ManufacturingProcess", "Machining"],
                "final_result": final_result
            }],
            "answers": [
                {"id": 1, "textual_representation": "Milling", "question_id": 3,
                 "knowledgeObject_ids": [7], "context_id": 0, "answer_source": "doc"},
                {"id": 2, "textual_representation": "Unknown", "question_id": 3,
                 "knowledgeObject_ids": [], "context_id": 0, "answer_source": "doc"}
            ]
        }))
    }

    fn templates() -> Source {
        Source::value(json!([{"broader_questionType": "ManufacturingProcess", "specific_questionType": "Machining"}]))
    }

    fn plain() -> OutputSettings {
        OutputSettings { mode: OutputMode::Plain, format: LinkedFormat::JsonLd, pretty: false }
    }

    #[test]
    fn test_end_to_end_plain() {
        let assembler = GraphAssembler::default();
        let output = assembler
            .build(&answers("Milling"), &templates(), &Source::text(PATTERNS), &plain())
            .unwrap();

        let rows: Vec<Vec<String>> = serde_json::from_str(&output).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![
                    "http://example_data.org/answer/0".to_string(),
                    "http://www.w3.org/2000/01/rdf-schema#label".to_string(),
                    "Milling".to_string(),
                ],
                vec![
                    "http://example.org/Part".to_string(),
                    "http://example.org/hasProcess".to_string(),
                    "http://example_data.org/answer/0".to_string(),
                ],
            ]
        );
    }

    #[test]
    fn test_two_token_lines_pass_through_plain_mode() {
        let patterns = "NAMESPACES\nex: <http://example.org/>\n\nIF ManufacturingProcess:\nex:hasProcess #ANSWER .\n\n";
        let assembler = GraphAssembler::default();
        let output = assembler
            .build(&answers("Milling"), &templates(), &Source::text(patterns), &plain())
            .unwrap();

        let rows: Vec<Vec<String>> = serde_json::from_str(&output).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][2], "Milling");
        assert_eq!(rows[1], vec!["http://example.org/hasProcess", "http://example_data.org/answer/0"]);

        // The same graph is not RDF.
        let linked = OutputSettings { mode: OutputMode::Linked, ..plain() };
        assert!(matches!(
            assembler.build(&answers("Milling"), &templates(), &Source::text(patterns), &linked),
            Err(GraphError::NotRdf { .. })
        ));
    }

    #[test]
    fn test_malformed_iri_fails_linked_output() {
        let patterns = "NAMESPACES\nex: <http://example.org/>\n\nIF ManufacturingProcess:\nex:Pa>rt ex:has #ANSWER .\n\n";
        let linked = OutputSettings { mode: OutputMode::Linked, format: LinkedFormat::NTriples, pretty: false };
        let err = GraphAssembler::default()
            .build(&answers("Milling"), &templates(), &Source::text(patterns), &linked)
            .unwrap_err();
        assert!(matches!(err, GraphError::NotRdf { reason: "malformed IRI", .. }));
    }

    #[test]
    fn test_report_counts() {
        let build = GraphAssembler::default()
            .assemble(&answers("Milling"), &templates(), &Source::text(PATTERNS))
            .unwrap();
        assert_eq!(build.report.templates, 1);
        assert_eq!(build.report.answers, 1);
        assert_eq!(build.report.answered_templates, 1);
        assert_eq!(build.report.bindings, 1);
        assert_eq!(build.report.minted_subjects, 1);
        assert_eq!(build.report.stats.total_triples, 2);
        assert!(Uuid::parse_str(&build.report.id).is_ok());
    }

    #[test]
    fn test_no_final_result_builds_empty_graph() {
        let build = GraphAssembler::default()
            .assemble(&answers(""), &templates(), &Source::text(PATTERNS))
            .unwrap();
        assert!(build.graph.is_empty());
        assert_eq!(build.graph.render(&plain()).unwrap(), "[]");
    }

    #[test]
    fn test_custom_subject_base() {
        let identifiers = IdentifierSettings {
            subject_base: "urn:answer:".to_string(),
            ..IdentifierSettings::default()
        };
        let build = GraphAssembler::new(identifiers)
            .assemble(&answers("Milling"), &templates(), &Source::text(PATTERNS))
            .unwrap();
        assert_eq!(build.graph.triples()[0].to_strings()[0], "urn:answer:0");
    }

    #[test]
    fn test_parse_errors_abort_the_build() {
        let err = GraphAssembler::default()
            .assemble(&answers("Milling"), &templates(), &Source::text("IF X:\nzz:a zz:b #ANSWER\n\n"))
            .unwrap_err();
        assert!(matches!(err, GraphError::Parse(ParseError::UnknownNamespace { .. })));
    }
}
