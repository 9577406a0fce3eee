// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module resolution and evaluation

use crate::value::Value;
use std::fmt;
use thiserror::Error;

/// Result type for module operations
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors produced while resolving, linking or evaluating modules.
///
/// Errors are cloneable because resolution and compile failures are
/// memoized per location and handed out again on every later lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModuleError {
    /// Specifier names a host module that is not registered
    #[error("unknown module: {0}")]
    UnknownHostModule(String),

    /// Resolution was locked and the module was never seen before
    #[error("the module {0:?} was not previously resolved during initialization")]
    ResolutionLocked(String),

    /// Specifier could not be turned into a canonical location
    #[error("invalid module specifier {specifier:?}: {reason}")]
    InvalidSpecifier {
        /// The specifier as written
        specifier: String,
        /// Reason for failure
        reason: String,
    },

    /// The loader could not produce the module source
    #[error("failed to load {location}: {reason}")]
    Load {
        /// Canonical location
        location: String,
        /// Reason for failure
        reason: String,
    },

    /// The compiler rejected the module source
    #[error("failed to compile {location}: {message}")]
    CompileFailure {
        /// Canonical location
        location: String,
        /// Compiler diagnostic
        message: String,
    },

    /// A statically imported name is not exported by its module
    #[error("the requested module {module} does not provide an export named {name:?}")]
    MissingExport {
        /// Location of the exporting module
        module: String,
        /// The imported name
        name: String,
    },

    /// A wrapper-style module left `module.exports` null or undefined
    #[error("exports must be an object (module {0})")]
    InvalidExports(String),

    /// Graph evaluation settled as rejected
    #[error("{0}")]
    EvaluationRejected(Exception),

    /// Evaluation would have to suspend at the top level
    #[error("top-level await is not supported (module {0})")]
    UnsupportedTopLevelSuspension(String),

    /// An internal invariant did not hold
    #[error("internal error: {0}")]
    Defect(String),
}

impl ModuleError {
    /// Create a new defect error
    pub fn defect(msg: impl Into<String>) -> Self {
        Self::Defect(msg.into())
    }

    /// Whether the error reports a broken configuration or an internal bug
    /// rather than a problem with user scripts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ModuleError::UnsupportedTopLevelSuspension(_) | ModuleError::Defect(_)
        )
    }
}

/// A value thrown by script code.
///
/// When the throw originated from a module operation (for example a failed
/// `require`), the typed error travels along so it can be recovered once the
/// exception leaves script code again.
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    value: Value,
    cause: Option<Box<ModuleError>>,
}

impl Exception {
    /// Creates an exception throwing `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            cause: None,
        }
    }

    /// Creates a `TypeError`-style exception.
    pub fn type_error(msg: impl fmt::Display) -> Self {
        Self::new(format!("TypeError: {}", msg))
    }

    /// The thrown value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The module error this exception was raised from, if any.
    pub fn cause(&self) -> Option<&ModuleError> {
        self.cause.as_deref()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl From<ModuleError> for Exception {
    fn from(err: ModuleError) -> Self {
        Self {
            value: Value::String(err.to_string()),
            cause: Some(Box::new(err)),
        }
    }
}

impl From<Exception> for ModuleError {
    fn from(exception: Exception) -> Self {
        match exception.cause {
            Some(cause) => *cause,
            None => ModuleError::EvaluationRejected(exception),
        }
    }
}
