use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizationError {
    #[error("Input validation error: {message}")]
    InputValidation { message: String },

    #[error("Invalid path expression '{path}': {message}")]
    PathSyntax { path: String, message: String },

    #[error("No values found at source path '{path}' for resource type {resource_type}")]
    Extraction { path: String, resource_type: String },

    #[error("Could not resolve target path '{path}' in resource type {resource_type}: {message}")]
    TargetResolution {
        path: String,
        resource_type: String,
        message: String,
    },

    #[error("Type incompatibility: {message}")]
    TypeIncompatibility { message: String },

    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error(
        "Failed to process operation '{operation}' for resource type {resource_type}: {message}"
    )]
    Unexpected {
        operation: String,
        resource_type: String,
        message: String,
    },

    #[error("Parse error at '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NormalizationError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::InputValidation {
            message: message.into(),
        }
    }

    pub fn path_syntax(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PathSyntax {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn incompatible(message: impl Into<String>) -> Self {
        Self::TypeIncompatibility {
            message: message.into(),
        }
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NormalizationError>;
