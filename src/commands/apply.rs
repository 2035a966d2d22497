//! `pgo apply` - converge the cluster to the definition

use anyhow::Result;
use dialoguer::Confirm;
use provision::{ConfirmCallback, Plan, Report, Setup};
use std::io::IsTerminal;

use crate::Context;
use crate::cli::{ApplyArgs, OutputFormat};
use crate::progress::TerminalProgress;
use crate::ui;

/// Shows the plan and asks before anything is executed.
struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, plan: &Plan) -> bool {
        ui::header("Plan");
        ui::display_plan(plan);
        println!();

        match Confirm::new()
            .with_prompt("Continue?")
            .default(true)
            .interact()
        {
            Ok(confirmed) => confirmed,
            Err(e) => {
                log::warn!("Could not read confirmation: {e}");
                false
            }
        }
    }
}

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let (directives, connector) = super::prepare(ctx, &args.definition)?;
    let show_progress = !ctx.quiet && args.format == OutputFormat::Text;

    let mut setup =
        Setup::new(&connector, directives).with_progress(TerminalProgress::new(show_progress));
    if !args.yes && !args.dry_run && std::io::stdin().is_terminal() {
        setup = setup.with_confirm(PromptConfirm);
    }

    match setup.execute(args.dry_run) {
        Ok(report) => render(&report, args.format),
        Err(err) => {
            // Show what was applied before the failure.
            if let Some(report) = err.report() {
                render(report, args.format)?;
            }
            Err(err.into())
        }
    }
}

fn render(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => ui::print_json(report),
        OutputFormat::Text => {
            ui::display_report(report);
            Ok(())
        }
    }
}
