pub mod loader;
pub mod schema;
pub mod settings;

pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{ConfigFile, ValidationError, ValidationIssue};
pub use settings::{default_patcher_list, PatchConfiguration, DEFAULT_EXIT_EXCEPTION_CLASSNAME};
