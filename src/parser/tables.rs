use std::collections::HashMap;

use crate::error::{ParseError, ParseResult};

/// Prefix → URI-root declarations, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceTable {
    entries: Vec<(String, String)>,
}

impl NamespaceTable {
    pub fn declare(&mut self, prefix: &str, root: &str, line: usize) -> ParseResult<()> {
        if self.get(prefix).is_some() {
            return Err(ParseError::DuplicateNamespace { prefix: prefix.to_string(), line });
        }
        self.entries.push((prefix.to_string(), root.to_string()));
        Ok(())
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, root)| root.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, r)| (p.as_str(), r.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Variable name → synthetic identifier, allocated in order of first appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableTable {
    base: String,
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl VariableTable {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns the identifier for `name`, allocating one on first use.
    pub fn intern(&mut self, name: &str) -> &str {
        let position = match self.index.get(name) {
            Some(&position) => position,
            None => {
                let position = self.entries.len();
                let iri = format!("{}{}", self.base, position);
                self.entries.push((name.to_string(), iri));
                self.index.insert(name.to_string(), position);
                position
            }
        };
        &self.entries[position].1
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.entries[i].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, iri)| (n.as_str(), iri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extracts the variable name from a `<name>` token. Trailing dots inside or after
/// the closing bracket are ignored, so `<name>.` and `<name.>` name `name` too.
pub fn variable_name(token: &str) -> Option<&str> {
    let inner = token.strip_prefix('<')?.trim_end_matches('.');
    let name = inner.strip_suffix('>')?.trim_end_matches('.');
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_name_forms() {
        assert_eq!(variable_name("<part>"), Some("part"));
        assert_eq!(variable_name("<part>."), Some("part"));
        assert_eq!(variable_name("<part.>"), Some("part"));
        assert_eq!(variable_name("<part"), None);
        assert_eq!(variable_name("<>"), None);
        assert_eq!(variable_name("part>"), None);
    }

    #[test]
    fn test_intern_is_stable() {
        let mut table = VariableTable::new("urn:var:");
        let first = table.intern("part").to_string();
        table.intern("tool");
        assert_eq!(table.intern("part"), first);
        assert_eq!(table.get("tool"), Some("urn:var:1"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_duplicate_prefix_is_rejected() {
        let mut table = NamespaceTable::default();
        table.declare("ex", "http://example.org/", 1).unwrap();
        let err = table.declare("ex", "http://other.org/", 2).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateNamespace { line: 2, .. }));
    }
}
