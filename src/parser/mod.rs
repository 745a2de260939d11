//! Compiler for the triple pattern language.
//!
//! ```text
//! NAMESPACES
//! ex: <http://example.org/>
//!
//! IF ManufacturingProcess:
//! <part> ex:hasProcess #ANSWER .
//!
//! IF OperationalParameter AND Normalload:
//! #ANSWER ex:appliesTo <part> .
//!
//! ```
//!
//! The file is line oriented. A line outside any block that contains `NAMESPACE`
//! switches to namespace declarations. A line starting with `IF` opens a block whose
//! remaining lines are triple lines. A blank line closes the block and registers its
//! compiled pattern under every key of the condition. A block that is still open at
//! end of input is dropped.

pub mod tables;

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::core::{Component, PatternTriple, TriplePattern, ANSWER_MARKER};
use crate::error::{ParseError, ParseResult};

pub use tables::{variable_name, NamespaceTable, VariableTable};

pub const DEFAULT_VARIABLE_BASE: &str = "http://example_data.org/variable/";

/// How the keys of a block condition were joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Only,
    And,
    Or,
}

/// Index of a compiled pattern inside its [`PatternSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(usize);

impl PatternId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternBlock {
    pub keys: Vec<String>,
    pub condition: Condition,
    pub pattern: PatternId,
    /// Line of the `IF` condition, 1-based.
    pub line: usize,
}

impl PatternBlock {
    pub fn is_multi_key(&self) -> bool {
        self.keys.len() > 1
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// The compiled form of one pattern file.
///
/// Patterns are stored once and referenced by [`PatternId`] from every key of their
/// block, so a pattern registered under `A AND B` is the same pattern under `A`
/// and under `B`.
#[derive(Debug, Clone)]
pub struct PatternSet {
    namespaces: NamespaceTable,
    variables: VariableTable,
    patterns: Vec<TriplePattern>,
    blocks: Vec<PatternBlock>,
    by_key: HashMap<String, Vec<PatternId>>,
}

impl PatternSet {
    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    pub fn blocks(&self) -> &[PatternBlock] {
        &self.blocks
    }

    /// Registered keys in order of first registration.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for key in self.blocks.iter().flat_map(|b| b.keys.iter()) {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn patterns_for(&self, key: &str) -> &[PatternId] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, key: &str) -> Vec<&TriplePattern> {
        self.patterns_for(key).iter().map(|&id| self.pattern(id)).collect()
    }

    pub fn pattern(&self, id: PatternId) -> &TriplePattern {
        &self.patterns[id.0]
    }

    pub fn pattern_mut(&mut self, id: PatternId) -> &mut TriplePattern {
        &mut self.patterns[id.0]
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

struct RawBlock {
    keys: Vec<String>,
    condition: Condition,
    line: usize,
    body: Vec<(usize, String)>,
}

#[derive(Debug, Clone)]
pub struct PatternParser {
    variable_base: String,
}

impl Default for PatternParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternParser {
    pub fn new() -> Self {
        Self {
            variable_base: DEFAULT_VARIABLE_BASE.to_string(),
        }
    }

    pub fn with_variable_base(mut self, base: impl Into<String>) -> Self {
        self.variable_base = base.into();
        self
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> ParseResult<PatternSet> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Read pattern file: {}", path.display());
        self.parse_str(&text)
    }

    pub fn parse_str(&self, text: &str) -> ParseResult<PatternSet> {
        let mut namespaces = NamespaceTable::default();
        let mut blocks: Vec<RawBlock> = Vec::new();
        let mut current: Option<RawBlock> = None;
        let mut in_namespaces = false;

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;

            if line.trim().is_empty() {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
                in_namespaces = false;
                continue;
            }

            if is_condition(line) {
                if current.is_some() {
                    return Err(ParseError::NestedCondition { line: line_no });
                }
                let (keys, condition) = parse_condition(line);
                if keys.is_empty() {
                    return Err(ParseError::EmptyCondition { line: line_no });
                }
                current = Some(RawBlock {
                    keys,
                    condition,
                    line: line_no,
                    body: Vec::new(),
                });
                continue;
            }

            if let Some(block) = current.as_mut() {
                block.body.push((line_no, line.to_string()));
                continue;
            }

            // The line that switches to declarations may itself be a declaration.
            if line.contains("NAMESPACE") {
                in_namespaces = true;
            }
            if in_namespaces {
                match parse_namespace(line) {
                    Some((prefix, root)) => namespaces.declare(prefix, root, line_no)?,
                    None => debug!("line {}: not a namespace declaration, ignored", line_no),
                }
            } else {
                debug!("line {}: outside any block, ignored", line_no);
            }
        }

        if let Some(block) = current {
            warn!(
                "Pattern block opened at line {} is not terminated by a blank line and was dropped",
                block.line
            );
        }

        for (prefix, root) in namespaces.iter() {
            if root.starts_with(&self.variable_base) || self.variable_base.starts_with(root) {
                return Err(ParseError::NamespaceCollision {
                    prefix: prefix.to_string(),
                    root: root.to_string(),
                    base: self.variable_base.clone(),
                });
            }
        }

        let mut variables = VariableTable::new(self.variable_base.clone());
        for (_, line) in blocks.iter().flat_map(|b| b.body.iter()) {
            for name in line.split_whitespace().filter_map(variable_name) {
                variables.intern(name);
            }
        }

        let mut patterns = Vec::with_capacity(blocks.len());
        let mut compiled_blocks = Vec::with_capacity(blocks.len());
        let mut by_key: HashMap<String, Vec<PatternId>> = HashMap::new();

        for block in blocks {
            let mut triples = Vec::with_capacity(block.body.len());
            for (line_no, line) in &block.body {
                if let Some(triple) = compile_line(line, *line_no, &namespaces, &variables)? {
                    triples.push(triple);
                }
            }

            let id = PatternId(patterns.len());
            patterns.push(TriplePattern::new(triples));
            for key in &block.keys {
                by_key.entry(key.clone()).or_default().push(id);
            }
            compiled_blocks.push(PatternBlock {
                keys: block.keys,
                condition: block.condition,
                pattern: id,
                line: block.line,
            });
        }

        info!(
            "Compiled {} pattern blocks ({} namespaces, {} variables)",
            compiled_blocks.len(),
            namespaces.len(),
            variables.len()
        );

        Ok(PatternSet {
            namespaces,
            variables,
            patterns,
            blocks: compiled_blocks,
            by_key,
        })
    }
}

/// `IF` opens a block only as a keyword of its own, so tokens such as `IFoo` stay
/// ordinary triple tokens.
fn is_condition(line: &str) -> bool {
    match line.strip_prefix("IF") {
        Some(rest) => rest.chars().next().map_or(true, |c| c.is_whitespace() || c == ':'),
        None => false,
    }
}

fn parse_condition(line: &str) -> (Vec<String>, Condition) {
    let expression = line.strip_prefix("IF").unwrap_or(line).replace(':', "");
    let expression = expression.trim();

    let (parts, condition): (Vec<&str>, Condition) = if expression.contains(" AND ") {
        (expression.split(" AND ").collect(), Condition::And)
    } else if expression.contains(" OR ") {
        (expression.split(" OR ").collect(), Condition::Or)
    } else {
        (vec![expression], Condition::Only)
    };

    let keys = parts
        .into_iter()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    (keys, condition)
}

fn parse_namespace(line: &str) -> Option<(&str, &str)> {
    static DECLARATION: OnceLock<Regex> = OnceLock::new();
    let re = DECLARATION.get_or_init(|| {
        Regex::new(r"^\s*([^\s:<>]+)\s*:\s*<([^>]*)>").expect("namespace declaration pattern is valid")
    });
    let captures = re.captures(line)?;
    let prefix = captures.get(1)?.as_str();
    let root = captures.get(2)?.as_str().trim();
    if root.is_empty() {
        None
    } else {
        Some((prefix, root))
    }
}

fn compile_line(
    line: &str,
    line_no: usize,
    namespaces: &NamespaceTable,
    variables: &VariableTable,
) -> ParseResult<Option<PatternTriple>> {
    let body = line.trim_end();
    let body = body.strip_suffix('.').unwrap_or(body);

    let components = body
        .split_whitespace()
        .map(|token| compile_token(token, line_no, namespaces, variables))
        .collect::<ParseResult<Vec<_>>>()?;

    if components.is_empty() {
        Ok(None)
    } else {
        Ok(Some(PatternTriple::new(components)))
    }
}

fn compile_token(
    token: &str,
    line: usize,
    namespaces: &NamespaceTable,
    variables: &VariableTable,
) -> ParseResult<Component> {
    if token.starts_with('<') {
        let name = variable_name(token).unwrap_or(token);
        return variables
            .get(name)
            .map(|iri| Component::Variable { name: name.to_string(), iri: iri.to_string() })
            .ok_or_else(|| ParseError::UnknownVariable { name: name.to_string(), line });
    }

    if let Some((prefix, local)) = token.split_once(':') {
        return namespaces
            .get(prefix)
            .map(|root| Component::Namespaced { root: root.to_string(), local: local.to_string() })
            .ok_or_else(|| ParseError::UnknownNamespace { prefix: prefix.to_string(), line });
    }

    if token == ANSWER_MARKER {
        Ok(Component::AnswerPlaceholder)
    } else {
        Ok(Component::Literal(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "NAMESPACES\nex: <http://example.org/>\n\n";

    fn parse(body: &str) -> ParseResult<PatternSet> {
        PatternParser::new().parse_str(&format!("{}{}", HEADER, body))
    }

    #[test]
    fn test_single_block_round_trip() {
        let set = parse(
            "IF ManufacturingProcess:\n\
             <part> ex:hasProcess #ANSWER .\n\
             <part> ex:type ex:Component .\n\n",
        )
        .unwrap();

        assert_eq!(set.keys(), vec!["ManufacturingProcess"]);
        let patterns = set.get("ManufacturingProcess");
        assert_eq!(patterns.len(), 1);

        let triples = patterns[0].triples();
        assert_eq!(triples.len(), 2);
        assert_eq!(
            triples[0].components[1],
            Component::Namespaced { root: "http://example.org/".to_string(), local: "hasProcess".to_string() }
        );
        assert_eq!(triples[0].components[2], Component::AnswerPlaceholder);
        assert_eq!(triples[0].components[0], triples[1].components[0]);
        match &triples[0].components[0] {
            Component::Variable { name, iri } => {
                assert_eq!(name, "part");
                assert_eq!(iri, "http://example_data.org/variable/0");
            }
            other => panic!("expected variable, got {:?}", other),
        }
    }

    #[test]
    fn test_and_or_register_same_pattern_under_each_key() {
        let set = parse(
            "IF A AND B:\n<x> ex:p #ANSWER .\n\n\
             IF C OR D\nex:s ex:p <x> .\n\n",
        )
        .unwrap();

        assert_eq!(set.patterns_for("A"), set.patterns_for("B"));
        assert_eq!(set.get("A")[0], set.get("B")[0]);
        assert_eq!(set.patterns_for("C"), set.patterns_for("D"));
        assert_eq!(set.blocks()[0].condition, Condition::And);
        assert_eq!(set.blocks()[1].condition, Condition::Or);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_variables_are_shared_across_blocks() {
        let set = parse("IF A:\n<x> ex:p ex:o .\n\nIF B:\nex:s ex:p <x>.\n\n").unwrap();
        assert_eq!(set.variables().len(), 1);
        assert_eq!(set.get("A")[0].triples()[0].components[0], set.get("B")[0].triples()[0].components[2]);
    }

    #[test]
    fn test_unterminated_block_is_dropped() {
        let set = parse("IF A:\nex:s ex:p ex:o .\n\nIF B:\nex:s ex:p ex:o .").unwrap();
        assert_eq!(set.keys(), vec!["A"]);
        assert!(set.get("B").is_empty());
    }

    #[test]
    fn test_empty_file_yields_empty_set() {
        let set = PatternParser::new().parse_str("").unwrap();
        assert!(set.is_empty());
        assert!(set.keys().is_empty());
    }

    #[test]
    fn test_unknown_namespace_is_fatal() {
        let err = parse("IF A:\nfoo:s ex:p ex:o .\n\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownNamespace { ref prefix, line: 5 } if prefix == "foo"));
    }

    #[test]
    fn test_unterminated_variable_is_unknown() {
        let err = parse("IF A:\n<x ex:p ex:o .\n\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownVariable { .. }));
    }

    #[test]
    fn test_nested_condition_is_rejected() {
        let err = parse("IF A:\nex:s ex:p ex:o .\nIF B:\n\n").unwrap_err();
        assert!(matches!(err, ParseError::NestedCondition { line: 6 }));
    }

    #[test]
    fn test_if_prefixed_token_is_a_triple_line() {
        let set = parse("IF A:\nIFoo ex:p #ANSWER .\n\n").unwrap();
        let triples = set.get("A")[0].triples();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].components[0], Component::Literal("IFoo".to_string()));

        assert!(is_condition("IF A:"));
        assert!(is_condition("IF:"));
        assert!(!is_condition("IFoo ex:p #ANSWER ."));
    }

    #[test]
    fn test_declaration_mentioning_namespace_is_kept() {
        let set = PatternParser::new()
            .parse_str(
                "NAMESPACES\nex: <http://example.org/>\nns: <http://example.org/NAMESPACE/>\n\n\
                 IF A:\nns:a ex:b #ANSWER .\n\n",
            )
            .unwrap();
        assert_eq!(set.namespaces().get("ns"), Some("http://example.org/NAMESPACE/"));
        assert_eq!(
            set.get("A")[0].triples()[0].components[0],
            Component::Namespaced { root: "http://example.org/NAMESPACE/".to_string(), local: "a".to_string() }
        );

        // A declaration can also open the namespace section on its own.
        let set = PatternParser::new()
            .parse_str("ns: <http://example.org/NAMESPACE/>\n\n")
            .unwrap();
        assert_eq!(set.namespaces().len(), 1);
    }

    #[test]
    fn test_namespace_overlapping_variables_is_rejected() {
        let err = PatternParser::new()
            .parse_str("NAMESPACES\nd: <http://example_data.org/>\n\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::NamespaceCollision { .. }));
    }

    #[test]
    fn test_condition_parsing() {
        assert_eq!(parse_condition("IF X:"), (vec!["X".to_string()], Condition::Only));
        assert_eq!(
            parse_condition("IF X AND Y:"),
            (vec!["X".to_string(), "Y".to_string()], Condition::And)
        );
        assert_eq!(parse_condition("IF:").0, Vec::<String>::new());
    }

    #[test]
    fn test_namespace_line_ignores_trailing_text() {
        assert_eq!(parse_namespace("ex: <http://example.org/> ."), Some(("ex", "http://example.org/")));
        assert_eq!(parse_namespace("NAMESPACES"), None);
        assert_eq!(parse_namespace("ex: <>"), None);
    }
}
