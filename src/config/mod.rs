pub mod loader;
pub mod schema;

pub use loader::{
    load_from_path, load_from_str, ConfigError, ConfigFormat, ConfigSource, DEFAULT_CONFIG_FILES,
};
pub use schema::{ProgramConfig, ValidationError, ValidationIssue};
