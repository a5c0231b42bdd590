use crate::ts::errors::TreeSitterError;
use crate::ts::tokens::TokenStream;
use tree_sitter::{Parser, Tree};

/// Tree-sitter parser wrapper for PHP source files.
///
/// Uses the full PHP grammar, so inline HTML around `<?php ... ?>` blocks is
/// part of the tree rather than a parse error.
pub struct PhpParser {
    parser: Parser,
}

impl PhpParser {
    pub fn new() -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        let language: tree_sitter::Language = tree_sitter_php::LANGUAGE_PHP.into();
        parser
            .set_language(&language)
            .map_err(|_| TreeSitterError::LanguageSet)?;

        Ok(Self { parser })
    }

    /// Parse source bytes into a tree-sitter Tree.
    pub fn parse(&mut self, source: &[u8]) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)
    }

    /// Parse source bytes and return the tree along with the source.
    pub fn parse_with_source<'a>(
        &mut self,
        source: &'a [u8],
    ) -> Result<ParsedSource<'a>, TreeSitterError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource { source, tree })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a [u8],
    pub tree: Tree,
}

impl<'a> ParsedSource<'a> {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Get all ERROR and MISSING nodes in the tree, in document order.
    pub fn error_nodes(&self) -> Vec<ErrorNode> {
        let mut errors = Vec::new();
        if self.has_errors() {
            collect_error_nodes(self.tree.root_node(), &mut errors);
        }
        errors
    }

    /// Fail with the first syntax error if the tree is not clean.
    pub fn ensure_valid(&self) -> Result<(), TreeSitterError> {
        let errors = self.error_nodes();
        match errors.first() {
            None => Ok(()),
            Some(first) => Err(TreeSitterError::SyntaxError {
                byte_start: first.byte_start,
                byte_end: first.byte_end,
                line: first.start_point.row + 1,
                column: first.start_point.column + 1,
                count: errors.len(),
            }),
        }
    }

    /// Extract the bytes covered by a node.
    pub fn node_bytes(&self, node: tree_sitter::Node<'_>) -> &'a [u8] {
        &self.source[node.byte_range()]
    }

    /// Build the lossless token stream for this tree.
    pub fn tokens(&self) -> TokenStream<'a> {
        TokenStream::from_tree(self.source, &self.tree)
    }
}

/// Information about an ERROR node in the parse tree.
#[derive(Debug, Clone)]
pub struct ErrorNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub start_point: tree_sitter::Point,
    pub end_point: tree_sitter::Point,
}

fn collect_error_nodes(node: tree_sitter::Node<'_>, errors: &mut Vec<ErrorNode>) {
    if node.is_error() || node.is_missing() {
        errors.push(ErrorNode {
            byte_start: node.start_byte(),
            byte_end: node.end_byte(),
            start_point: node.start_position(),
            end_point: node.end_position(),
        });
    }

    // Only descend where an error is known to live.
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            collect_error_nodes(child, errors);
        }
    }
}
