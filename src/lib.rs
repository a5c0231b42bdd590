//! Monkey Patcher: load-time call rewriting for PHP test suites
//!
//! Rewrites calls to selected global functions so a test can substitute
//! deterministic stand-ins, without touching the files under test.
//!
//! # Architecture
//!
//! All rewriting compiles down to a single primitive: an [`Edit`] that
//! replaces exactly one token of the original source. Patchers find the
//! tokens (via tree-sitter queries over the PHP grammar); the reassembler
//! emits every other byte verbatim.
//!
//! A load goes through these stages:
//!
//! 1. [`interceptor::load`] hands the path to the installed provider.
//! 2. [`PatchManager`] checks the [`PathScope`]; out-of-scope files are
//!    served as read from disk.
//! 3. The [`RewriteCache`] answers if it holds a rewrite of the same content
//!    under the same configuration.
//! 4. Otherwise the [`Pipeline`] parses once, collects edits from every
//!    patcher, and the result is written back to the cache.
//!
//! # Guarantees
//!
//! - Output is byte-identical to the input outside the rewritten tokens
//! - Two patchers claiming the same token is an error, never a silent merge
//! - Cache writes are atomic (tempfile + fsync + rename)
//! - Changing any configuration axis invalidates every cached rewrite
//!
//! # Example
//!
//! ```no_run
//! use monkey_patcher::{PatchConfiguration, PatchManager};
//!
//! let mut config = PatchConfiguration::new();
//! config.set_cache_dir("tests/_tmp/cache")?;
//! config.set_include_paths(["application"])?;
//! config.add_whitelist(["random_string"])?;
//!
//! let mut manager = PatchManager::new(config);
//! let resolved = manager.resolve("application/controllers/Welcome.php")?;
//! println!("{:?}: {} bytes", resolved.origin, resolved.bytes.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod config;
pub mod edit;
pub mod interceptor;
pub mod manager;
pub mod patcher;
pub mod pool;
pub mod reassemble;
pub mod scope;
pub mod ts;

// Re-exports
pub use cache::{Axis, AxisSnapshot, CacheError, RewriteCache, SourceFingerprint};
pub use config::{load_from_path, load_from_str, ConfigError, PatchConfiguration};
pub use edit::{Edit, EditError, EditSet, EditVerification};
pub use interceptor::{
    install, is_installed, load, uninstall, InterceptError, LoadInterceptor, LoadedSource,
    PassThrough, SourceProvider,
};
pub use manager::{ManagerStats, Origin, PatchManager, ResolveError, Resolved};
pub use patcher::{
    ExitPatcher, FunctionPatcher, MethodPatcher, NameSet, ParsedUnit, PatchError, PatchOutput,
    Patcher, Pipeline,
};
pub use reassemble::reassemble;
pub use scope::PathScope;
pub use ts::{PhpParser, QueryEngine, QueryMatch, TokenStream, TreeSitterError};
