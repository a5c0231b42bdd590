//! Lossless token stream built from a tree-sitter tree.
//!
//! Every non-empty leaf becomes one token and every byte range between leaves
//! becomes a trivia token, so the concatenated token texts always equal the
//! original source. A token's position is its index in the stream.

use tree_sitter::Tree;

/// Node kind recorded for gap tokens that no leaf covers.
pub const TRIVIA_KIND: &str = "trivia";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Starting byte offset (inclusive)
    pub start: usize,
    /// Ending byte offset (exclusive)
    pub end: usize,
    /// Leaf node kind, or [`TRIVIA_KIND`]
    pub kind: &'static str,
    /// Whether the leaf is a named node in the grammar
    pub named: bool,
    /// Kind of the leaf's parent node
    pub parent_kind: Option<&'static str>,
}

impl Token {
    fn trivia(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            kind: TRIVIA_KIND,
            named: false,
            parent_kind: None,
        }
    }

    pub fn is_trivia(&self) -> bool {
        self.kind == TRIVIA_KIND
    }

    pub fn is_comment(&self) -> bool {
        self.kind == "comment"
    }
}

#[derive(Debug, Clone)]
pub struct TokenStream<'a> {
    source: &'a [u8],
    tokens: Vec<Token>,
}

impl<'a> TokenStream<'a> {
    pub fn from_tree(source: &'a [u8], tree: &Tree) -> Self {
        let mut tokens = Vec::new();
        let mut offset = 0usize;
        let mut parents: Vec<&'static str> = Vec::new();
        let mut cursor = tree.walk();

        'walk: loop {
            let node = cursor.node();
            if node.child_count() > 0 {
                parents.push(node.kind());
                cursor.goto_first_child();
                continue;
            }

            let (start, end) = (node.start_byte(), node.end_byte());
            if end > start && start >= offset && end <= source.len() {
                if start > offset {
                    tokens.push(Token::trivia(offset, start));
                }
                tokens.push(Token {
                    start,
                    end,
                    kind: node.kind(),
                    named: node.is_named(),
                    parent_kind: parents.last().copied(),
                });
                offset = end;
            }

            while !cursor.goto_next_sibling() {
                if !cursor.goto_parent() {
                    break 'walk;
                }
                parents.pop();
            }
        }

        if offset < source.len() {
            tokens.push(Token::trivia(offset, source.len()));
        }

        Self { source, tokens }
    }

    pub fn source(&self) -> &'a [u8] {
        self.source
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Token> {
        self.tokens.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Bytes of the token at `position`.
    pub fn text(&self, position: usize) -> Option<&'a [u8]> {
        self.tokens
            .get(position)
            .map(|token| &self.source[token.start..token.end])
    }

    /// Position of the token starting exactly at `byte`.
    pub fn position_at(&self, byte: usize) -> Option<usize> {
        self.tokens
            .binary_search_by_key(&byte, |token| token.start)
            .ok()
    }

    /// Next position after `position` that is neither trivia nor a comment.
    pub fn next_significant(&self, position: usize) -> Option<usize> {
        self.tokens
            .iter()
            .enumerate()
            .skip(position + 1)
            .find(|(_, token)| !token.is_trivia() && !token.is_comment())
            .map(|(idx, _)| idx)
    }
}
