//! Error taxonomy for provisioning runs.
//!
//! Every failure the core can produce is one of five classes. They are all
//! fatal for the run and surface unmodified at the [`Setup`](crate::Setup)
//! boundary; the core never retries.

use crate::directive::ObjectKey;
use crate::report::Report;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of provisioning errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or duplicate directive
    Validation,
    /// Unresolved reference or a dropped object that is still depended upon
    Dependency,
    /// Cluster unreachable or authentication failure
    Connection,
    /// Catalog read failed or was denied
    Introspection,
    /// Statement rejected by the backend while applying
    Execution,
}

impl ErrorCategory {
    /// Short user-facing label.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid definition",
            Self::Dependency => "Unresolved dependency",
            Self::Connection => "Connection failed",
            Self::Introspection => "Could not read cluster state",
            Self::Execution => "Statement failed",
        }
    }

    /// Actionable advice for this category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the definition and run again",
            Self::Dependency => {
                "Declare the referenced object, or stop referencing an object marked absent"
            }
            Self::Connection => "Check host, port and credentials in the connection environment",
            Self::Introspection => "The connecting role needs read access to the system catalogs",
            Self::Execution => {
                "Operations applied before the failure were kept; fix the cause and re-run apply"
            }
        }
    }
}

/// Errors that can occur while inspecting or provisioning a cluster.
#[derive(Debug, Error)]
pub enum Error {
    /// A directive is malformed or its identity is declared twice
    #[error("validation error: {message}")]
    Validation {
        /// What is wrong with the definition
        message: String,
    },

    /// A reference does not resolve, or an absent object is still referenced
    #[error("dependency error: {from} references {to}: {reason}")]
    Dependency {
        /// The referring object
        from: ObjectKey,
        /// Name of the referenced object
        to: String,
        /// Why the reference cannot be satisfied
        reason: String,
    },

    /// The cluster could not be reached or rejected the credentials
    #[error("connection error: {message}")]
    Connection {
        /// Message from the transport
        message: String,
        /// Progress of the apply that lost its connection, if one was running
        report: Option<Box<Report>>,
    },

    /// A catalog query failed
    #[error("introspection error: {message} (query: {query})")]
    Introspection {
        /// The catalog query that failed
        query: String,
        /// Message from the backend
        message: String,
    },

    /// A statement was rejected during apply
    #[error("execution error: {statement}: {message}")]
    Execution {
        /// The statement that failed
        statement: String,
        /// Message from the backend
        message: String,
        /// Everything that happened up to and including the failure
        report: Box<Report>,
    },
}

impl Error {
    /// Build a validation error from any displayable message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build a connection error raised outside of an apply.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            report: None,
        }
    }

    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Dependency { .. } => ErrorCategory::Dependency,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Introspection { .. } => ErrorCategory::Introspection,
            Self::Execution { .. } => ErrorCategory::Execution,
        }
    }

    /// The partial report of a failed apply.
    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Execution { report, .. } => Some(report.as_ref()),
            Self::Connection { report, .. } => report.as_deref(),
            _ => None,
        }
    }
}
