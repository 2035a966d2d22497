//! Executor - applies a plan one statement at a time
//!
//! Operations run strictly in plan order on the session's connections.
//! The first failure stops the run; nothing already applied is rolled back.
//! A rejected statement is an execution error, a lost or refused connection
//! a connection error. Both carry the report of the run so far.

use crate::connection::{Session, TransportError};
use crate::context::ProgressCallback;
use crate::diff::Plan;
use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::report::{Report, ReportEntry, Status};
use log::{debug, info, warn};

/// Execute `plan`, or only record it when `dry_run` is set.
///
/// # Returns
/// The report of every operation. When an operation fails the error carries
/// the report, with the failing entry marked `Failed` and the remaining
/// entries `Skipped`.
pub fn run(
    plan: &Plan,
    session: &mut Session<'_>,
    dry_run: bool,
    progress: &mut dyn ProgressCallback,
) -> Result<Report> {
    let mut report = Report::new(dry_run);

    if dry_run {
        for operation in plan {
            let statement = operation.display_statement();
            warn!("Dry run, not executing: {statement}");
            progress.on_operation_start(operation, &statement);
            progress.on_operation_complete(operation, Status::Planned);
            report.push(ReportEntry::new(operation, Status::Planned));
        }
        progress.on_finish();
        return Ok(report);
    }

    let operations = plan.operations();
    for (position, operation) in operations.iter().enumerate() {
        progress.on_operation_start(operation, &operation.display_statement());

        match apply(operation, session) {
            Ok(()) => {
                info!("Applied: {}", operation.display_statement());
                progress.on_operation_complete(operation, Status::Applied);
                report.push(ReportEntry::new(operation, Status::Applied));
            }
            Err(failure) => {
                progress.on_operation_complete(operation, Status::Failed);
                let mut failed = ReportEntry::new(operation, Status::Failed);
                failed.error = Some(failure.to_string());
                report.push(failed);
                for rest in &operations[position + 1..] {
                    report.push(ReportEntry::new(rest, Status::Skipped));
                }
                progress.on_finish();
                let report = Box::new(report);
                return Err(match failure {
                    TransportError::Unreachable(message) => Error::Connection {
                        message,
                        report: Some(report),
                    },
                    TransportError::Rejected(message) => Error::Execution {
                        statement: operation.display_statement(),
                        message,
                        report,
                    },
                });
            }
        }
    }

    progress.on_finish();
    Ok(report)
}

/// Transmit one operation.
fn apply(
    operation: &Operation,
    session: &mut Session<'_>,
) -> std::result::Result<(), TransportError> {
    // A database cannot be dropped while this run holds a connection to it.
    if let Operation::DropDatabase { name } = operation {
        session.release(name);
    }

    let statement = operation.statement();
    debug!("Executing: {}", operation.display_statement());
    let connection = session.on(operation.database()).map_err(|e| match e {
        Error::Connection { message, .. } => TransportError::Unreachable(message),
        other => TransportError::Unreachable(other.to_string()),
    })?;
    connection.execute(&statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::FakeCluster;
    use crate::context::NoProgress;
    use crate::directive::{Directive, Group};
    use crate::error::ErrorCategory;
    use crate::state::CurrentState;
    use crate::{DirectiveSet, diff};

    fn group_plan(names: &[&str]) -> Plan {
        let directives = names
            .iter()
            .map(|n| Directive::Group(Group::new(*n, true).unwrap()))
            .collect();
        diff::plan(&DirectiveSet::new(directives).unwrap(), &CurrentState::new())
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProgressCallback for Recorder {
        fn on_operation_start(&mut self, operation: &Operation, _statement: &str) {
            self.events.push(format!("start {operation}"));
        }

        fn on_operation_complete(&mut self, operation: &Operation, status: Status) {
            self.events.push(format!("{status:?} {operation}"));
        }
    }

    #[test]
    fn test_apply_runs_in_order() {
        let cluster = FakeCluster::new();
        let mut session = Session::new(&cluster);
        let plan = group_plan(&["a", "b"]);

        let report = run(&plan, &mut session, false, &mut NoProgress).unwrap();

        assert_eq!(
            cluster.statements(),
            ["CREATE ROLE \"a\"", "CREATE ROLE \"b\""]
        );
        assert_eq!(report.summary().applied, 2);
        assert!(!report.dry_run);
    }

    #[test]
    fn test_dry_run_transmits_nothing() {
        let cluster = FakeCluster::new();
        let mut session = Session::new(&cluster);
        let plan = group_plan(&["a", "b"]);
        let mut recorder = Recorder::default();

        let report = run(&plan, &mut session, true, &mut recorder).unwrap();

        assert!(cluster.statements().is_empty());
        assert!(cluster.journal.borrow().connects.is_empty());
        assert!(report.entries.iter().all(|e| e.status == Status::Planned));
        assert_eq!(report.len(), 2);
        assert_eq!(recorder.events.len(), 4);
    }

    #[test]
    fn test_fail_fast() {
        let cluster = FakeCluster::new();
        cluster.fail_statement("\"b\"");
        let mut session = Session::new(&cluster);
        let plan = group_plan(&["a", "b", "c"]);

        let err = run(&plan, &mut session, false, &mut NoProgress).unwrap_err();

        assert_eq!(cluster.statements(), ["CREATE ROLE \"a\""]);
        let report = err.report().unwrap();
        let statuses: Vec<Status> = report.entries.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            [Status::Applied, Status::Failed, Status::Skipped]
        );
        assert!(report.failure().unwrap().error.is_some());
        assert!(matches!(err, Error::Execution { .. }));
    }

    #[test]
    fn test_refused_database_is_connection_error() {
        let cluster = FakeCluster::new();
        cluster.refuse("app");
        let mut session = Session::new(&cluster);
        let plan = diff::plan(
            &DirectiveSet::new(vec![
                Directive::Group(Group::new("readers", true).unwrap()),
                Directive::Schema(crate::directive::Schema::new("app", "raw", None, true).unwrap()),
            ])
            .unwrap(),
            &CurrentState::unloaded(),
        );

        let err = run(&plan, &mut session, false, &mut NoProgress).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Connection);
        assert!(err.to_string().contains("database 'app'"));
        let report = err.report().unwrap();
        let statuses: Vec<Status> = report.entries.iter().map(|e| e.status).collect();
        assert_eq!(statuses, [Status::Applied, Status::Failed]);
        assert_eq!(cluster.statements(), ["CREATE ROLE \"readers\""]);
    }

    #[test]
    fn test_connection_lost_mid_apply() {
        let cluster = FakeCluster::new();
        cluster.drop_connection_on("\"b\"");
        let mut session = Session::new(&cluster);
        let plan = group_plan(&["a", "b", "c"]);

        let err = run(&plan, &mut session, false, &mut NoProgress).unwrap_err();

        match &err {
            Error::Connection { message, report } => {
                assert!(message.contains("closed the connection"));
                let report = report.as_deref().unwrap();
                assert_eq!(report.summary().applied, 1);
                assert_eq!(report.summary().skipped, 1);
                assert!(report.failure().unwrap().error.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cluster.statements(), ["CREATE ROLE \"a\""]);
    }

    #[test]
    fn test_schema_statements_use_their_database() {
        let cluster = FakeCluster::new();
        let mut session = Session::new(&cluster);
        let plan = diff::plan(
            &DirectiveSet::new(vec![Directive::Schema(
                crate::directive::Schema::new("app", "raw", None, true).unwrap(),
            )])
            .unwrap(),
            &CurrentState::unloaded(),
        );

        run(&plan, &mut session, false, &mut NoProgress).unwrap();

        let journal = cluster.journal.borrow();
        assert_eq!(
            journal.statements,
            [("app".to_string(), "CREATE SCHEMA \"raw\"".to_string())]
        );
    }

    #[test]
    fn test_connection_released_before_database_drop() {
        let cluster = FakeCluster::new();
        let mut session = Session::new(&cluster);
        session.on(Some("old")).unwrap();
        assert_eq!(session.open_connections(), 1);

        let mut current = CurrentState::new();
        current.add_database("old", None);
        let plan = diff::plan(
            &DirectiveSet::new(vec![Directive::Database(
                crate::directive::Database::new("old", None, false).unwrap(),
            )])
            .unwrap(),
            &current,
        );
        run(&plan, &mut session, false, &mut NoProgress).unwrap();

        let journal = cluster.journal.borrow();
        assert_eq!(journal.statements[0].0, "postgres");
        assert_eq!(journal.statements[0].1, "DROP DATABASE \"old\"");
    }
}
