//! Check command - report whether a bundle needs rebuilding

use super::{coordinator, current_dir};
use crate::cli::args::RequestArgs;
use crate::config::Config;
use crate::error::{RollcacheError, RollcacheResult};
use crate::fs::{FileSystem, TokioFs};
use crate::middleware::Request;
use crate::ui::{self, UiContext};
use chrono::{DateTime, Local};
use std::path::Path;

/// Execute the check command
pub async fn execute(args: RequestArgs, config: &Config) -> RollcacheResult<()> {
    let ctx = UiContext::detect();
    let cwd = current_dir()?;
    let coordinator = coordinator(config, &cwd, args.source_map)?;

    let request = Request::new(&args.method, &args.path);
    let Some(target) = coordinator.route(&request) else {
        ui::step_warn_hint(
            &ctx,
            &format!("{} {} is not a bundle request", args.method, args.path),
            "Only GET and HEAD requests for .js files are handled",
        );
        return Ok(());
    };
    let rebuild = args.rebuild.unwrap_or(coordinator.options().rebuild);

    ui::key_value(&ctx, "entry", &describe(&target.entry).await?);
    ui::key_value(&ctx, "dest", &describe(&target.dest).await?);
    ui::key_value(&ctx, "rebuild", &rebuild.to_string());

    match coordinator.check(&target, rebuild).await? {
        None => ui::step_warn_hint(&ctx, "No source entry", "The request would be passed on"),
        Some(decision) if decision.needed => ui::step_info(&ctx, "Rebuild needed"),
        Some(_) => ui::step_ok(&ctx, "Up to date"),
    }

    Ok(())
}

/// Path with its modification time, or "missing"
async fn describe(path: &Path) -> RollcacheResult<String> {
    let state = TokioFs
        .stat(path)
        .await
        .map_err(|e| RollcacheError::io(format!("reading metadata of {}", path.display()), e))?;

    Ok(match state {
        Some(state) => {
            let modified: DateTime<Local> = state.modified.into();
            format!("{} (modified {})", path.display(), modified.format("%Y-%m-%d %H:%M:%S"))
        }
        None => format!("{} (missing)", path.display()),
    })
}
