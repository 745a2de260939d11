use tracing::{debug, info};

use crate::answers::Answer;
use crate::parser::{PatternId, PatternSet};
use crate::templates::QuestionTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(usize);

impl TemplateId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnswerId(usize);

impl AnswerId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A question template together with everything matched to it.
#[derive(Debug, Clone)]
pub struct BoundTemplate {
    pub template: QuestionTemplate,
    pub patterns: Vec<PatternId>,
    pub answers: Vec<AnswerId>,
    pub has_final_answer: bool,
}

/// An answer whose template names have been resolved to templates.
#[derive(Debug, Clone)]
pub struct LinkedAnswer {
    pub answer: Answer,
    pub templates: Vec<TemplateId>,
}

/// Result of matching answers and patterns against question templates.
#[derive(Debug, Clone, Default)]
pub struct Matching {
    pub templates: Vec<BoundTemplate>,
    pub answers: Vec<LinkedAnswer>,
}

impl Matching {
    pub fn template(&self, id: TemplateId) -> &BoundTemplate {
        &self.templates[id.0]
    }

    pub fn answer(&self, id: AnswerId) -> &Answer {
        &self.answers[id.0].answer
    }

    /// Templates that carry at least one answer with a final result.
    pub fn answered(&self) -> impl Iterator<Item = &BoundTemplate> {
        self.templates.iter().filter(|t| t.has_final_answer)
    }

    /// Answers that matched no template.
    pub fn unmatched_answers(&self) -> impl Iterator<Item = &LinkedAnswer> {
        self.answers.iter().filter(|a| a.templates.is_empty())
    }
}

pub struct TemplateMatcher;

impl TemplateMatcher {
    /// Patterns a template receives: single-key blocks keyed by its broader type,
    /// and multi-key blocks that list both its broader and specific type.
    pub fn attach_patterns(template: &QuestionTemplate, patterns: &PatternSet) -> Vec<PatternId> {
        let broader = template.broader_question_type.as_str();
        let specific = template.specific_question_type.as_str();

        patterns
            .blocks()
            .iter()
            .filter(|block| {
                if !block.has_key(broader) {
                    return false;
                }
                !block.is_multi_key() || block.has_key(specific)
            })
            .map(|block| block.pattern)
            .collect()
    }

    /// Cross-links answers with templates and templates with compiled patterns.
    pub fn link(patterns: &PatternSet, templates: Vec<QuestionTemplate>, answers: Vec<Answer>) -> Matching {
        let mut bound: Vec<BoundTemplate> = templates
            .into_iter()
            .map(|template| {
                let attached = Self::attach_patterns(&template, patterns);
                debug!("Template {} receives {} patterns", template.identity(), attached.len());
                BoundTemplate {
                    template,
                    patterns: attached,
                    answers: Vec::new(),
                    has_final_answer: false,
                }
            })
            .collect();

        let mut linked = Vec::with_capacity(answers.len());
        for (index, answer) in answers.into_iter().enumerate() {
            let answer_id = AnswerId(index);
            let mut matched = Vec::new();

            for (position, template) in bound.iter_mut().enumerate() {
                let t = &template.template;
                if answer.refers_to(&t.broader_question_type, &t.specific_question_type) {
                    template.answers.push(answer_id);
                    template.has_final_answer |= answer.has_final_result();
                    matched.push(TemplateId(position));
                }
            }

            if matched.is_empty() {
                debug!("Answer for {:?} matched no question template", answer.question_template);
            }
            linked.push(LinkedAnswer { answer, templates: matched });
        }

        let matching = Matching { templates: bound, answers: linked };
        info!(
            "Matched {} answers against {} templates ({} with a final answer)",
            matching.answers.len(),
            matching.templates.len(),
            matching.answered().count()
        );
        matching
    }
}
