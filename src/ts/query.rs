use crate::ts::errors::TreeSitterError;
use crate::ts::parser::ParsedSource;
use std::collections::HashMap;
use tree_sitter::{Query, QueryCursor, StreamingIterator};

/// A match from a tree-sitter query with captured nodes.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    /// The full match byte range
    pub byte_start: usize,
    pub byte_end: usize,
    /// Named captures: capture_name -> captured node
    pub captures: HashMap<String, CapturedNode>,
}

impl QueryMatch {
    pub fn capture(&self, name: &str) -> Result<&CapturedNode, TreeSitterError> {
        self.captures
            .get(name)
            .ok_or_else(|| TreeSitterError::CaptureNotFound {
                name: name.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct CapturedNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub kind: &'static str,
}

/// Engine for executing tree-sitter queries against parsed PHP source.
pub struct QueryEngine {
    query: Query,
    capture_names: Vec<String>,
}

impl QueryEngine {
    /// Create a new query engine from a tree-sitter query string.
    ///
    /// Captures are prefixed with `@` and can be referenced by name:
    /// ```text
    /// (function_call_expression
    ///   function: (name) @name) @call
    /// ```
    pub fn new(query_str: &str) -> Result<Self, TreeSitterError> {
        let language: tree_sitter::Language = tree_sitter_php::LANGUAGE_PHP.into();
        let query = Query::new(&language, query_str).map_err(|e| TreeSitterError::InvalidQuery {
            message: e.to_string(),
        })?;

        let capture_names = query.capture_names().iter().map(|s| s.to_string()).collect();

        Ok(Self {
            query,
            capture_names,
        })
    }

    /// Execute the query against parsed source and return all matches in
    /// document order.
    pub fn find_all(&self, parsed: &ParsedSource<'_>) -> Vec<QueryMatch> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, parsed.root_node(), parsed.source);

        let mut results = Vec::new();

        // tree-sitter 0.25+ uses StreamingIterator
        while let Some(m) = matches.next() {
            let mut captures = HashMap::new();
            let mut overall_start = usize::MAX;
            let mut overall_end = 0usize;

            for capture in m.captures {
                let node = capture.node;
                let name = &self.capture_names[capture.index as usize];

                overall_start = overall_start.min(node.start_byte());
                overall_end = overall_end.max(node.end_byte());

                captures.insert(
                    name.clone(),
                    CapturedNode {
                        byte_start: node.start_byte(),
                        byte_end: node.end_byte(),
                        kind: node.kind(),
                    },
                );
            }

            if overall_start != usize::MAX {
                results.push(QueryMatch {
                    byte_start: overall_start,
                    byte_end: overall_end,
                    captures,
                });
            }
        }

        results.sort_by_key(|m| (m.byte_start, m.byte_end));
        results
    }

    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }
}

/// Queries for the PHP constructs the patchers rewrite.
pub mod queries {
    /// Every call whose callee is an unqualified name, e.g. `rand(1, 10)`.
    ///
    /// Qualified (`\rand()`) and dynamic (`$fn()`) callees have a different
    /// node kind in the `function` field and never match.
    pub const UNQUALIFIED_CALLS: &str = r#"(function_call_expression
        function: (name) @name
        arguments: (arguments) @args
    ) @call"#;

    /// Every method declaration that has a body.
    pub const METHOD_BODIES: &str = r#"(method_declaration
        name: (name) @name
        body: (compound_statement) @body
    ) @method"#;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::parser::PhpParser;

    #[test]
    fn find_unqualified_calls() {
        let mut parser = PhpParser::new().unwrap();
        let source = br#"<?php
$a = rand(1, 10);
$b = \time();
$c = $fn(3);
$d = md5(uniqid());
"#;
        let parsed = parser.parse_with_source(source).unwrap();
        let engine = QueryEngine::new(queries::UNQUALIFIED_CALLS).unwrap();

        let names: Vec<&[u8]> = engine
            .find_all(&parsed)
            .iter()
            .map(|m| {
                let name = m.capture("name").unwrap();
                &source[name.byte_start..name.byte_end]
            })
            .collect();
        assert_eq!(names, vec![&b"rand"[..], b"md5", b"uniqid"]);
    }

    #[test]
    fn find_method_bodies() {
        let mut parser = PhpParser::new().unwrap();
        let source = br#"<?php
abstract class Foo {
    public function bar() { return 1; }
    abstract public function baz();
}
"#;
        let parsed = parser.parse_with_source(source).unwrap();
        let engine = QueryEngine::new(queries::METHOD_BODIES).unwrap();

        let matches = engine.find_all(&parsed);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].capture("body").unwrap().kind, "compound_statement");
    }

    #[test]
    fn missing_capture_is_an_error() {
        let mut parser = PhpParser::new().unwrap();
        let parsed = parser.parse_with_source(b"<?php time();").unwrap();
        let engine = QueryEngine::new(queries::UNQUALIFIED_CALLS).unwrap();

        let matches = engine.find_all(&parsed);
        assert!(matches!(
            matches[0].capture("nope"),
            Err(TreeSitterError::CaptureNotFound { .. })
        ));
    }

    #[test]
    fn invalid_query_is_rejected() {
        assert!(matches!(
            QueryEngine::new("(not_a_real_node) @x"),
            Err(TreeSitterError::InvalidQuery { .. })
        ));
    }
}
