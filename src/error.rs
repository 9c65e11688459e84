// src/error.rs

//! Error types for recipe rendering and artifact lookup

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while rendering recipes or probing package caches
#[derive(Error, Debug)]
pub enum Error {
    /// A requirement string could not be parsed
    #[error("malformed requirement spec '{spec}': {reason}")]
    MalformedSpec { spec: String, reason: String },

    /// A pin was requested for a package with no resolved version
    #[error("cannot pin {0}: no resolved version available")]
    UnresolvedPackage(String),

    /// Two exact pins for the same package disagree
    #[error("conflicting exact pins for {name}: '{first}' and '{second}'")]
    ConstraintConflict {
        name: String,
        first: String,
        second: String,
    },

    /// The recipe path does not exist
    #[error("non-existent: {}", .0.display())]
    RecipeNotFound(PathBuf),

    /// The path exists but is not a recipe directory, file or archive
    #[error("non-recipe: {}", .0.display())]
    NotARecipe(PathBuf),

    /// A package's `info/index.json` could not be parsed
    #[error("malformed index.json at {}: {reason}", .path.display())]
    MalformedIndex { path: PathBuf, reason: String },

    /// A pin expression such as `x.x` is invalid
    #[error("invalid pin expression '{0}'")]
    InvalidPin(String),

    /// A version string cannot take part in pin arithmetic
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// The variant table is inconsistent
    #[error("invalid variant table: {0}")]
    VariantError(String),

    /// Recipe or configuration parse failure
    #[error("parse error: {0}")]
    ParseError(String),

    /// I/O failure with context
    #[error("I/O error: {0}")]
    IoError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::MalformedSpec`] for the given input
    pub fn malformed(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error comes from acquiring the recipe source
    ///
    /// The command-line driver terminates immediately on these.
    pub fn is_recipe_acquisition(&self) -> bool {
        matches!(self, Self::RecipeNotFound(_) | Self::NotARecipe(_))
    }
}
