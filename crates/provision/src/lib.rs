//! # Provision
//!
//! Declarative provisioning of cluster groups, users, databases, schemas and
//! database privileges.
//!
//! Callers declare the desired state as a collection of directives. A run
//! takes a snapshot of the cluster limited to the declared names, validates
//! that every reference resolves, computes the difference and applies it as
//! an ordered sequence of statements.
//!
//! ## Core Concepts
//!
//! - **Directive**: The desired state of one named object, present or absent
//! - **CurrentState**: What the cluster holds for the declared names
//! - **Plan**: The ordered operations that close the gap between the two
//! - **Report**: What was planned, applied, failed or skipped
//!
//! ## Example
//!
//! ```ignore
//! use provision::Setup;
//!
//! let report = Setup::builder(&connector)
//!     .group("devops", false)?
//!     .group("datascience", true)?
//!     .user("johnny", Some("johnny"), &["datascience"], true)?
//!     .database("datascience", Some("johnny"), true)?
//!     .schema("datascience", "private", Some("johnny"), true)?
//!     .database_privilege("datascience", "datascience", &["CONNECT"], true)?
//!     .build()?
//!     .execute(false)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`Connector`]: Opens connections to the cluster, one per database
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This keeps the crate free of any particular driver or UI.

pub mod collection;
pub mod connection;
pub mod context;
pub mod diff;
pub mod directive;
pub mod error;
pub mod executor;
pub mod inspector;
pub mod operation;
pub mod order;
pub mod report;
pub mod setup;
pub mod state;

// Re-export main types at crate root
pub use collection::DirectiveSet;
pub use connection::{Connection, Connector, Row, Session, TransportError};
pub use context::{AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use diff::Plan;
pub use directive::{
    Database, DatabasePrivilege, Directive, Group, MAX_IDENTIFIER_LEN, ObjectKey, ObjectKind,
    Password, Privilege, Schema, User, md5_role_password,
};
pub use error::{Error, ErrorCategory, Result};
pub use operation::{Direction, Operation, Verb};
pub use report::{Report, ReportEntry, ReportSummary, Status};
pub use setup::{Setup, SetupBuilder};
pub use state::CurrentState;
