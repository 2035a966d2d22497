//! Setup - drives a single provisioning run
//!
//! A [`Setup`] owns the frozen directive collection and is consumed by
//! either [`Setup::inspect`] or [`Setup::execute`]. Both take a fresh
//! snapshot of the cluster, since its state may change between runs.

use crate::collection::DirectiveSet;
use crate::connection::{Connector, Session};
use crate::context::{AutoConfirm, ConfirmCallback, NoProgress, ProgressCallback};
use crate::diff::{self, Plan};
use crate::directive::{Database, DatabasePrivilege, Directive, Group, Password, Schema, User};
use crate::error::Result;
use crate::executor;
use crate::inspector;
use crate::order;
use crate::report::{Report, Status};
use crate::state::CurrentState;
use log::info;

/// Orchestrates snapshot, validation, diff and execution for one run.
pub struct Setup<'a> {
    connector: &'a dyn Connector,
    directives: DirectiveSet,
    progress: Box<dyn ProgressCallback + 'a>,
    confirm: Box<dyn ConfirmCallback + 'a>,
}

impl<'a> Setup<'a> {
    pub fn new(connector: &'a dyn Connector, directives: DirectiveSet) -> Self {
        Self {
            connector,
            directives,
            progress: Box::new(NoProgress),
            confirm: Box::new(AutoConfirm),
        }
    }

    /// Start declaring directives one by one.
    pub fn builder(connector: &'a dyn Connector) -> SetupBuilder<'a> {
        SetupBuilder {
            connector,
            directives: Vec::new(),
        }
    }

    pub fn with_progress(mut self, progress: impl ProgressCallback + 'a) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn with_confirm(mut self, confirm: impl ConfirmCallback + 'a) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    pub fn directives(&self) -> &DirectiveSet {
        &self.directives
    }

    /// Compute the plan without changing the cluster.
    ///
    /// With `load_current_state` unset the cluster is not contacted at all:
    /// the plan is computed against an empty state and references outside
    /// the collection are assumed to exist.
    pub fn inspect(mut self, load_current_state: bool) -> Result<Plan> {
        let mut session = Session::new(self.connector);
        let current = if load_current_state {
            self.progress.on_inspect_start();
            inspector::snapshot(&mut session, &self.directives)?
        } else {
            CurrentState::unloaded()
        };
        let plan = self.plan(&current)?;
        self.progress.on_plan(plan.len(), true);
        self.progress.on_finish();
        Ok(plan)
    }

    /// Converge the cluster, or only report what would change on a dry run.
    pub fn execute(mut self, dry_run: bool) -> Result<Report> {
        let mut session = Session::new(self.connector);
        self.progress.on_inspect_start();
        let current = inspector::snapshot(&mut session, &self.directives)?;
        let plan = self.plan(&current)?;
        self.progress.on_plan(plan.len(), dry_run);

        if plan.is_empty() {
            info!("Nothing to do, cluster already matches the definition");
            self.progress.on_finish();
            return Ok(Report::new(dry_run));
        }

        if !dry_run && !self.confirm.confirm(&plan) {
            info!("Apply declined, {} operations skipped", plan.len());
            self.progress.on_finish();
            return Ok(Report::uniform(&plan, Status::Skipped, dry_run));
        }

        executor::run(&plan, &mut session, dry_run, self.progress.as_mut())
    }

    fn plan(&self, current: &CurrentState) -> Result<Plan> {
        order::validate(&self.directives, current)?;
        let plan = diff::plan(&self.directives, current);
        info!(
            "Planned {} operations for {} directives",
            plan.len(),
            self.directives.len()
        );
        Ok(plan)
    }
}

/// Collects directives in declared order and freezes them into a [`Setup`].
pub struct SetupBuilder<'a> {
    connector: &'a dyn Connector,
    directives: Vec<Directive>,
}

impl<'a> SetupBuilder<'a> {
    pub fn directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn group(self, name: &str, present: bool) -> Result<Self> {
        Ok(self.directive(Directive::Group(Group::new(name, present)?)))
    }

    pub fn user(
        self,
        name: &str,
        password: Option<&str>,
        groups: &[&str],
        present: bool,
    ) -> Result<Self> {
        let user = User::new(
            name,
            password.map(Password::new),
            groups.iter().copied(),
            present,
        )?;
        Ok(self.directive(Directive::User(user)))
    }

    pub fn database(self, name: &str, owner: Option<&str>, present: bool) -> Result<Self> {
        let database = Database::new(name, owner.map(str::to_string), present)?;
        Ok(self.directive(Directive::Database(database)))
    }

    pub fn schema(
        self,
        database: &str,
        name: &str,
        owner: Option<&str>,
        present: bool,
    ) -> Result<Self> {
        let schema = Schema::new(database, name, owner.map(str::to_string), present)?;
        Ok(self.directive(Directive::Schema(schema)))
    }

    pub fn database_privilege(
        self,
        database: &str,
        group: &str,
        privileges: &[&str],
        present: bool,
    ) -> Result<Self> {
        let privilege = DatabasePrivilege::new(database, group, privileges, present)?;
        Ok(self.directive(Directive::DatabasePrivilege(privilege)))
    }

    /// Freeze the collection. Duplicate identities are rejected here.
    pub fn build(self) -> Result<Setup<'a>> {
        Ok(Setup::new(self.connector, DirectiveSet::new(self.directives)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::FakeCluster;
    use crate::context::AutoDecline;
    use crate::error::{Error, ErrorCategory};
    use crate::operation::Operation;

    /// The definition from the project README, against a cluster where
    /// `devops`, `datascience` (the database), its schema and `existingdb`
    /// already exist.
    fn example(cluster: &FakeCluster) -> Setup<'_> {
        Setup::builder(cluster)
            .group("devops", false)
            .unwrap()
            .group("datascience", true)
            .unwrap()
            .user("johnny", Some("johnny"), &["datascience"], false)
            .unwrap()
            .user("peter", Some("peter"), &["devops"], false)
            .unwrap()
            .database("datascience", Some("devops"), false)
            .unwrap()
            .database("existingdb", None, true)
            .unwrap()
            .schema("existingdb", "existingschema", Some("devops"), false)
            .unwrap()
            .schema("datascience", "private", Some("devops"), false)
            .unwrap()
            .database_privilege("existingdb", "datascience", &["CONNECT", "TEMP"], false)
            .unwrap()
            .build()
            .unwrap()
    }

    fn seed(cluster: &FakeCluster) {
        cluster
            .answer(
                "FROM pg_roles WHERE",
                vec![
                    vec![Some("devops"), Some("f")],
                    vec![Some("peter"), Some("t")],
                ],
            )
            .answer(
                "FROM pg_database WHERE",
                vec![
                    vec![Some("datascience"), Some("devops")],
                    vec![Some("existingdb"), Some("postgres")],
                ],
            )
            .answer_on(
                Some("datascience"),
                "FROM pg_namespace",
                vec![vec![Some("private"), Some("devops")]],
            );
    }

    #[test]
    fn test_example_inspect() {
        let cluster = FakeCluster::new();
        seed(&cluster);

        let plan = example(&cluster).inspect(true).unwrap();
        let ops: Vec<String> = plan.iter().map(ToString::to_string).collect();
        assert_eq!(
            ops,
            [
                "drop schema datascience.private",
                "drop database datascience",
                "drop user peter",
                "drop group devops",
                "create group datascience",
            ]
        );
        assert!(cluster.statements().is_empty());
    }

    #[test]
    fn test_example_execute() {
        let cluster = FakeCluster::new();
        seed(&cluster);

        let report = example(&cluster).execute(false).unwrap();
        assert_eq!(report.summary().applied, 5);
        let journal = cluster.journal.borrow();
        let statements: Vec<(&str, &str)> = journal
            .statements
            .iter()
            .map(|(db, sql)| (db.as_str(), sql.as_str()))
            .collect();
        assert_eq!(
            statements,
            [
                ("datascience", "DROP SCHEMA \"private\""),
                ("postgres", "DROP DATABASE \"datascience\""),
                ("postgres", "DROP USER \"peter\""),
                ("postgres", "DROP ROLE \"devops\""),
                ("postgres", "CREATE ROLE \"datascience\""),
            ]
        );
    }

    #[test]
    fn test_dry_run_reports_planned() {
        let cluster = FakeCluster::new();
        seed(&cluster);

        let report = example(&cluster).execute(true).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.summary().planned, 5);
        assert_eq!(report.summary().applied, 0);
        assert!(cluster.statements().is_empty());
    }

    #[test]
    fn test_declined_confirmation_skips_everything() {
        let cluster = FakeCluster::new();
        seed(&cluster);

        let report = example(&cluster)
            .with_confirm(AutoDecline)
            .execute(false)
            .unwrap();
        assert_eq!(report.summary().skipped, 5);
        assert!(cluster.statements().is_empty());
    }

    #[test]
    fn test_inspect_without_current_state_touches_nothing() {
        let cluster = FakeCluster::unreachable();
        let setup = Setup::builder(&cluster)
            .user("johnny", None, &["analysts"], true)
            .unwrap()
            .build()
            .unwrap();
        let plan = setup.inspect(false).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_duplicate_directive_fails_before_cluster_access() {
        let cluster = FakeCluster::unreachable();
        let result = Setup::builder(&cluster)
            .group("devops", true)
            .unwrap()
            .group("devops", false)
            .unwrap()
            .build();
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_dependency_error_before_diff() {
        let cluster = FakeCluster::new();
        let setup = Setup::builder(&cluster)
            .user("johnny", None, &["nobody"], true)
            .unwrap()
            .build()
            .unwrap();
        let err = setup.execute(false).err().unwrap();
        assert!(matches!(err, Error::Dependency { .. }));
        assert!(cluster.statements().is_empty());
    }

    fn warehouse(cluster: &FakeCluster) -> Setup<'_> {
        Setup::builder(cluster)
            .group("analysts", true)
            .unwrap()
            .user("johnny", Some("johnny"), &["analysts"], true)
            .unwrap()
            .database("warehouse", Some("johnny"), true)
            .unwrap()
            .schema("warehouse", "raw", Some("johnny"), true)
            .unwrap()
            .database_privilege("warehouse", "analysts", &["CONNECT", "TEMP"], true)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_second_run_after_apply_is_empty() {
        let empty = FakeCluster::new();
        let first = warehouse(&empty).execute(false).unwrap();
        assert_eq!(first.summary().applied, 5);

        // The same cluster as the catalogs report it after the first run.
        let hash = crate::directive::md5_role_password("johnny", "johnny");
        let provisioned = FakeCluster::new();
        provisioned
            .answer(
                "FROM pg_roles WHERE",
                vec![
                    vec![Some("analysts"), Some("f")],
                    vec![Some("johnny"), Some("t")],
                ],
            )
            .answer(
                "FROM pg_auth_members",
                vec![vec![Some("johnny"), Some("analysts")]],
            )
            .answer(
                "FROM pg_authid",
                vec![vec![Some("johnny"), Some(hash.as_str())]],
            )
            .answer(
                "FROM pg_database WHERE",
                vec![vec![Some("warehouse"), Some("johnny")]],
            )
            .answer_on(
                Some("warehouse"),
                "FROM pg_namespace",
                vec![vec![Some("raw"), Some("johnny")]],
            )
            .answer(
                "aclexplode",
                vec![
                    vec![Some("warehouse"), Some("analysts"), Some("CONNECT")],
                    vec![Some("warehouse"), Some("analysts"), Some("TEMPORARY")],
                ],
            );

        let second = warehouse(&provisioned).execute(false).unwrap();
        assert!(second.is_empty());
        assert!(provisioned.statements().is_empty());
    }

    #[test]
    fn test_ownership_moves_before_old_owner_dropped() {
        let cluster = FakeCluster::new();
        cluster
            .answer("FROM pg_roles WHERE", vec![vec![Some("legacy"), Some("f")]])
            .answer(
                "FROM pg_database WHERE",
                vec![vec![Some("app"), Some("legacy")]],
            )
            .answer_on(
                Some("app"),
                "FROM pg_namespace",
                vec![vec![Some("raw"), Some("legacy")]],
            );
        let setup = Setup::builder(&cluster)
            .group("legacy", false)
            .unwrap()
            .group("team", true)
            .unwrap()
            .database("app", Some("team"), true)
            .unwrap()
            .schema("app", "raw", Some("team"), true)
            .unwrap()
            .build()
            .unwrap();

        setup.execute(false).unwrap();

        let journal = cluster.journal.borrow();
        let statements: Vec<(&str, &str)> = journal
            .statements
            .iter()
            .map(|(db, sql)| (db.as_str(), sql.as_str()))
            .collect();
        assert_eq!(
            statements,
            [
                ("postgres", "CREATE ROLE \"team\""),
                ("app", "ALTER SCHEMA \"raw\" OWNER TO \"team\""),
                ("postgres", "ALTER DATABASE \"app\" OWNER TO \"team\""),
                ("postgres", "DROP ROLE \"legacy\""),
            ]
        );
    }

    #[test]
    fn test_roles_found_under_the_other_kind() {
        let cluster = FakeCluster::new();
        cluster.answer(
            "FROM pg_roles WHERE",
            vec![
                vec![Some("johnny"), Some("f")],
                vec![Some("peter"), Some("t")],
            ],
        );
        let setup = Setup::builder(&cluster)
            .group("peter", false)
            .unwrap()
            .user("johnny", None, &[], true)
            .unwrap()
            .build()
            .unwrap();

        let plan = setup.inspect(true).unwrap();
        let statements: Vec<String> = plan.iter().map(Operation::statement).collect();
        assert_eq!(
            statements,
            ["DROP ROLE \"peter\"", "ALTER ROLE \"johnny\" LOGIN"]
        );
    }

    #[test]
    fn test_connection_lost_during_apply() {
        let cluster = FakeCluster::new();
        cluster.drop_connection_on("CREATE DATABASE");

        let err = warehouse(&cluster).execute(false).err().unwrap();

        assert_eq!(err.category(), ErrorCategory::Connection);
        let report = err.report().unwrap();
        assert_eq!(report.summary().applied, 2);
        assert_eq!(report.summary().failed, 1);
        assert_eq!(report.summary().skipped, 2);
    }

    #[test]
    fn test_empty_plan_is_success() {
        let cluster = FakeCluster::new();
        cluster.answer("FROM pg_roles WHERE", vec![vec![Some("ops"), Some("f")]]);
        let setup = Setup::builder(&cluster)
            .group("ops", true)
            .unwrap()
            .build()
            .unwrap();
        let report = setup.execute(false).unwrap();
        assert!(report.is_empty());
        assert!(report.is_success());
    }
}
