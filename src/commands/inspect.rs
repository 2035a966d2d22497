//! `pgo inspect` - show the plan without changing the cluster

use anyhow::Result;
use provision::Setup;

use crate::Context;
use crate::cli::{InspectArgs, OutputFormat};
use crate::progress::TerminalProgress;
use crate::ui;

pub fn run(ctx: &Context, args: InspectArgs) -> Result<()> {
    let (directives, connector) = super::prepare(ctx, &args.definition)?;
    let show_progress = !ctx.quiet && args.format == OutputFormat::Text;

    let plan = Setup::new(&connector, directives)
        .with_progress(TerminalProgress::new(show_progress))
        .inspect(!args.no_current_state)?;

    match args.format {
        OutputFormat::Json => ui::print_json(&plan.to_report(true)),
        OutputFormat::Text => {
            ui::header("Plan");
            if args.no_current_state {
                ui::warn("Current state not loaded; every declared object is treated as missing");
            }
            ui::display_plan(&plan);
            Ok(())
        }
    }
}
