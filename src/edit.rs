use std::collections::btree_map::{self, BTreeMap};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental rewrite primitive: replace the token at `position`.
///
/// Patchers never splice bytes directly. They record which token to replace
/// and what they expect that token to read, and the reassembler applies all
/// edits in a single ordered pass over the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Index of the replaced token in the token stream
    pub position: usize,
    /// Text emitted instead of the token
    pub replacement: String,
    /// Verification of what we expect the token to read
    pub expected_before: EditVerification,
    /// Name of the patcher that produced this edit
    pub patcher: String,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact bytes required
    ExactMatch(Vec<u8>),
    /// xxh3 hash of expected bytes (used for large tokens)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &[u8]) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected.as_slice(),
            EditVerification::Hash(expected_hash) => xxh3_64(text) == *expected_hash,
        }
    }

    /// Create verification from bytes, using hash for text over 1KB.
    pub fn from_bytes(text: &[u8]) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text))
        } else {
            EditVerification::ExactMatch(text.to_vec())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("patchers '{existing}' and '{incoming}' both rewrite token {position}")]
    Collision {
        position: usize,
        existing: String,
        incoming: String,
    },

    #[error("edit positions {positions:?} not present in a stream of {token_count} tokens")]
    PositionNotFound {
        positions: Vec<usize>,
        token_count: usize,
    },

    #[error("token {position} does not match what patcher '{patcher}' expected (found {found:?})")]
    BeforeTextMismatch {
        position: usize,
        patcher: String,
        found: String,
    },
}

impl Edit {
    pub fn new(
        patcher: impl Into<String>,
        position: usize,
        expected_before: &[u8],
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            position,
            replacement: replacement.into(),
            expected_before: EditVerification::from_bytes(expected_before),
            patcher: patcher.into(),
        }
    }
}

/// Edits for one source unit, ordered by token position.
///
/// A position can be claimed once. The ascending iteration order of the map
/// is what lets the reassembler consume edits in a single forward pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSet {
    edits: BTreeMap<usize, Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edit, failing if another edit already claimed its position.
    pub fn insert(&mut self, edit: Edit) -> Result<(), EditError> {
        match self.edits.entry(edit.position) {
            btree_map::Entry::Occupied(existing) => Err(EditError::Collision {
                position: edit.position,
                existing: existing.get().patcher.clone(),
                incoming: edit.patcher,
            }),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(edit);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn contains(&self, position: usize) -> bool {
        self.edits.contains_key(&position)
    }

    pub fn get(&self, position: usize) -> Option<&Edit> {
        self.edits.get(&position)
    }

    /// Edits in ascending position order.
    pub fn iter(&self) -> btree_map::Values<'_, usize, Edit> {
        self.edits.values()
    }

    /// Number of edits contributed by one patcher.
    pub fn count_for(&self, patcher: &str) -> usize {
        self.iter().filter(|edit| edit.patcher == patcher).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::ExactMatch(b"rand".to_vec());
        assert!(verify.matches(b"rand"));
        assert!(!verify.matches(b"mt_rand"));
    }

    #[test]
    fn test_edit_verification_hash() {
        let text = b"hello world";
        let verify = EditVerification::Hash(xxh3_64(text));
        assert!(verify.matches(text));
        assert!(!verify.matches(b"goodbye world"));
    }

    #[test]
    fn test_edit_verification_from_text_large() {
        let text = vec![b'x'; 2000];
        assert!(matches!(
            EditVerification::from_bytes(&text),
            EditVerification::Hash(_)
        ));
        assert!(matches!(
            EditVerification::from_bytes(b"small"),
            EditVerification::ExactMatch(_)
        ));
    }

    #[test]
    fn test_insert_orders_by_position() {
        let mut edits = EditSet::new();
        edits.insert(Edit::new("function", 9, b"time", "X::time")).unwrap();
        edits.insert(Edit::new("function", 2, b"rand", "X::rand")).unwrap();
        edits.insert(Edit::new("method", 5, b"{", "{ prologue")).unwrap();

        let positions: Vec<usize> = edits.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![2, 5, 9]);
        assert_eq!(edits.count_for("function"), 2);
    }

    #[test]
    fn test_collision_is_rejected_and_keeps_first() {
        let mut edits = EditSet::new();
        edits.insert(Edit::new("exit", 4, b"die", "exit__")).unwrap();

        let err = edits
            .insert(Edit::new("function", 4, b"die", "\\__FuncProxy__::die"))
            .unwrap_err();
        assert_eq!(
            err,
            EditError::Collision {
                position: 4,
                existing: "exit".to_string(),
                incoming: "function".to_string(),
            }
        );
        assert_eq!(edits.get(4).unwrap().replacement, "exit__");
        assert_eq!(edits.len(), 1);
    }
}
