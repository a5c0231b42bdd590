//! Persistent store of rewritten sources, invalidated per configuration axis.

pub mod axes;
pub mod errors;
pub mod store;

pub use axes::{Axis, AxisSnapshot};
pub use errors::CacheError;
pub use store::{RewriteCache, SourceFingerprint, EXTRA_BLACKLIST_FILE};
