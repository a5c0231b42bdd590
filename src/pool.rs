//! Thread-local parser and query pooling.
//!
//! Every resolve on a cache miss parses one file and runs a few queries, so
//! the parser and the compiled queries are created once per thread and reused
//! for all subsequent loads.

use crate::ts::{PhpParser, QueryEngine, TreeSitterError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

thread_local! {
    static PHP_PARSER: RefCell<Option<PhpParser>> = const { RefCell::new(None) };
}

/// Execute function with pooled parser instance.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use monkey_patcher::pool::with_parser;
///
/// let has_errors = with_parser(|parser| {
///     parser.parse_with_source(b"<?php echo time();").map(|p| p.has_errors())
/// })??;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut PhpParser) -> R,
{
    PHP_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let parser = match slot.take() {
            Some(parser) => parser,
            None => PhpParser::new()?,
        };
        Ok(f(slot.insert(parser)))
    })
}

const MAX_CACHED_QUERIES: usize = 32;

thread_local! {
    // Keyed by query source text; each patcher uses a fixed query string.
    static QUERY_CACHE: RefCell<HashMap<String, Rc<QueryEngine>>> =
        RefCell::new(HashMap::new());
}

/// Execute function with a compiled query, compiling it on first use per thread.
///
/// The cache is capped; when full it is cleared and rebuilt on demand.
pub fn with_query<F, R>(query_str: &str, f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&QueryEngine) -> R,
{
    let engine = QUERY_CACHE.with(|cache| -> Result<Rc<QueryEngine>, TreeSitterError> {
        let mut cache = cache.borrow_mut();
        if let Some(engine) = cache.get(query_str) {
            return Ok(Rc::clone(engine));
        }

        if cache.len() >= MAX_CACHED_QUERIES {
            cache.clear();
        }

        let engine = Rc::new(QueryEngine::new(query_str)?);
        cache.insert(query_str.to_string(), Rc::clone(&engine));
        Ok(engine)
    })?;

    Ok(f(&engine))
}

/// Number of compiled queries cached on this thread.
pub fn cached_query_count() -> usize {
    QUERY_CACHE.with(|cache| cache.borrow().len())
}
