use crate::engine::EngineKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no tree grammar registered for {path}")]
    UnsupportedLanguage { path: PathBuf },

    #[error("failed to set tree-sitter language for {language}")]
    LanguageSet { language: String },

    #[error("failed to parse {path}")]
    ParseFailed { path: PathBuf },

    #[error("file {path} is not part of the working copy")]
    UnknownFile { path: PathBuf },

    #[error("point {index} is out of range for {path} ({len} points)")]
    PointOutOfRange {
        path: PathBuf,
        index: usize,
        len: usize,
    },

    #[error("{path} holds {found} contents but the {expected} engine was asked to edit it")]
    RepresentationMismatch {
        path: PathBuf,
        expected: EngineKind,
        found: &'static str,
    },
}
