use crate::config::schema::{ProgramConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Config files looked up in the project root when no config is given.
pub const DEFAULT_CONFIG_FILES: [&str; 3] = [".gipatch.json", ".pyggi.config", "gipatch.toml"];

/// On-disk config syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML; everything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Where a [`crate::Program`] takes its configuration from.
#[derive(Debug, Clone, Default)]
pub enum ConfigSource {
    /// First of [`DEFAULT_CONFIG_FILES`] found in the project root
    #[default]
    Default,
    /// Config file; relative paths resolve against the project root
    Path(PathBuf),
    /// Already-parsed configuration
    Inline(ProgramConfig),
}

impl From<ProgramConfig> for ConfigSource {
    fn from(config: ProgramConfig) -> Self {
        ConfigSource::Inline(config)
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::Path(path)
    }
}

impl From<&str> for ConfigSource {
    fn from(path: &str) -> Self {
        ConfigSource::Path(PathBuf::from(path))
    }
}

impl ConfigSource {
    /// Resolve into a validated config for the project at `project`.
    pub fn resolve(self, project: &Path) -> Result<ProgramConfig, ConfigError> {
        match self {
            ConfigSource::Inline(config) => {
                config
                    .validate()
                    .map_err(|source| ConfigError::Validation { path: None, source })?;
                Ok(config)
            }
            ConfigSource::Path(path) => {
                let path = if path.is_absolute() {
                    path
                } else {
                    project.join(path)
                };
                load_from_path(path)
            }
            ConfigSource::Default => {
                let found = DEFAULT_CONFIG_FILES
                    .iter()
                    .map(|name| project.join(name))
                    .find(|path| path.is_file())
                    .ok_or_else(|| ConfigError::NotFound {
                        project: project.to_path_buf(),
                    })?;
                load_from_path(found)
            }
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    NotFound {
        project: PathBuf,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Json { path: None, source } => ConfigError::Json {
                path: Some(path),
                source,
            },
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Json { path, source } => match path {
                Some(path) => write!(f, "failed to parse config JSON ({}): {}", path.display(), source),
                None => write!(f, "failed to parse config JSON: {}", source),
            },
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse config TOML ({}): {}", path.display(), source),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
            ConfigError::NotFound { project } => write!(
                f,
                "no config given and none of {} found in {}",
                DEFAULT_CONFIG_FILES.join(", "),
                project.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Json { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::NotFound { .. } => None,
        }
    }
}

pub fn load_from_str(input: &str, format: ConfigFormat) -> Result<ProgramConfig, ConfigError> {
    let config: ProgramConfig = match format {
        ConfigFormat::Json => serde_json::from_str(input)
            .map_err(|source| ConfigError::Json { path: None, source })?,
        ConfigFormat::Toml => toml_edit::de::from_str(input)
            .map_err(|source| ConfigError::Toml { path: None, source })?,
    };
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ProgramConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents, ConfigFormat::from_path(path)).map_err(|error| error.with_path(path))
}
