//! Patchers: turn a parsed PHP source into token edits.
//!
//! A [`Pipeline`] parses a source once and hands the same [`ParsedUnit`] to
//! each patcher in order. Every patcher adds to the edit set accumulated by
//! the ones before it, and claiming a token another patcher already claimed
//! is a fatal collision. A single reassembly pass then produces the output.

pub mod convention;
pub mod exit;
pub mod function;
pub mod method;
pub mod names;

pub use exit::ExitPatcher;
pub use function::FunctionPatcher;
pub use method::MethodPatcher;
pub use names::NameSet;

use crate::edit::{EditError, EditSet};
use crate::pool::with_parser;
use crate::reassemble::reassemble;
use crate::ts::{validate_rewrite, ParsedSource, TokenStream, TreeSitterError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error(transparent)]
    Parse(#[from] TreeSitterError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("no token starts at byte {byte} (patcher '{patcher}')")]
    TokenNotFound { patcher: String, byte: usize },
}

/// A source parsed once and shared by every patcher of a pipeline.
pub struct ParsedUnit<'a> {
    pub parsed: ParsedSource<'a>,
    pub tokens: TokenStream<'a>,
}

impl<'a> ParsedUnit<'a> {
    /// Parse `source`, failing on any syntax error.
    pub fn parse(source: &'a [u8]) -> Result<Self, TreeSitterError> {
        let parsed = with_parser(|parser| parser.parse_with_source(source))??;
        parsed.ensure_valid()?;
        let tokens = parsed.tokens();
        Ok(Self { parsed, tokens })
    }

    pub fn source(&self) -> &'a [u8] {
        self.parsed.source
    }

    /// Position of the single token spanning exactly `start..end`.
    pub fn token_at(&self, patcher: &str, start: usize, end: usize) -> Result<usize, PatchError> {
        self.tokens
            .position_at(start)
            .filter(|&pos| self.tokens.get(pos).is_some_and(|token| token.end == end))
            .ok_or_else(|| PatchError::TokenNotFound {
                patcher: patcher.to_string(),
                byte: start,
            })
    }

    /// Smallest node covering exactly `start..end`.
    pub fn node_at(&self, start: usize, end: usize) -> Option<tree_sitter::Node<'_>> {
        self.parsed
            .root_node()
            .descendant_for_byte_range(start, end)
            .filter(|node| node.start_byte() == start && node.end_byte() == end)
    }
}

/// A source rewriter contributing edits to a pipeline.
pub trait Patcher: Send + Sync {
    /// Identity used in the configured pipeline list and the cache fingerprint.
    fn name(&self) -> &str;

    /// Add this patcher's edits for `unit` to `edits`.
    fn collect(&self, unit: &ParsedUnit<'_>, edits: &mut EditSet) -> Result<(), PatchError>;

    /// Run this patcher alone over `source`.
    ///
    /// Returns the rewritten source and whether anything was rewritten. With
    /// no edits the input comes back unchanged.
    fn patch(&self, source: &[u8]) -> Result<(Vec<u8>, bool), PatchError> {
        let unit = ParsedUnit::parse(source)?;
        let mut edits = EditSet::new();
        self.collect(&unit, &mut edits)?;
        if edits.is_empty() {
            return Ok((source.to_vec(), false));
        }
        Ok((reassemble(&unit.tokens, &edits)?, true))
    }
}

/// Result of running a pipeline over one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutput {
    pub source: Vec<u8>,
    pub patched: bool,
    pub edit_count: usize,
}

/// Ordered list of patchers run against a single parse.
#[derive(Default)]
pub struct Pipeline {
    patchers: Vec<Box<dyn Patcher>>,
    verify_output: bool,
}

impl Pipeline {
    pub fn new(patchers: Vec<Box<dyn Patcher>>) -> Self {
        Self {
            patchers,
            verify_output: false,
        }
    }

    /// Re-parse every rewritten source and reject new syntax errors.
    pub fn with_output_verification(mut self, verify: bool) -> Self {
        self.verify_output = verify;
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.patchers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.patchers.is_empty()
    }

    pub fn run(&self, source: &[u8]) -> Result<PatchOutput, PatchError> {
        let unchanged = || PatchOutput {
            source: source.to_vec(),
            patched: false,
            edit_count: 0,
        };

        if self.patchers.is_empty() {
            return Ok(unchanged());
        }

        let unit = ParsedUnit::parse(source)?;
        let mut edits = EditSet::new();
        for patcher in &self.patchers {
            patcher.collect(&unit, &mut edits)?;
        }

        if edits.is_empty() {
            return Ok(unchanged());
        }

        let rewritten = reassemble(&unit.tokens, &edits)?;
        if self.verify_output {
            validate_rewrite(source, &rewritten)?;
        }

        Ok(PatchOutput {
            source: rewritten,
            patched: true,
            edit_count: edits.len(),
        })
    }
}
