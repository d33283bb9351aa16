//! Build command - bring one bundle up to date

use super::{coordinator, current_dir};
use crate::cli::args::RequestArgs;
use crate::config::Config;
use crate::error::{RollcacheError, RollcacheResult};
use crate::middleware::{Outcome, Request};
use crate::ui::{self, TaskSpinner, UiContext};
use std::io::Write;

/// Execute the build command
pub async fn execute(args: RequestArgs, config: &Config) -> RollcacheResult<()> {
    let ctx = UiContext::detect();
    let cwd = current_dir()?;
    let coordinator = coordinator(config, &cwd, args.source_map)?;

    let request = Request::new(&args.method, &args.path);
    let Some(target) = coordinator.route(&request) else {
        ui::step_warn_hint(
            &ctx,
            &format!("{} {} is not a bundle request", args.method, args.path),
            "Only GET and HEAD requests for .js files are built",
        );
        return Ok(());
    };
    let rebuild = args.rebuild.unwrap_or(coordinator.options().rebuild);
    let dest = target.dest.display().to_string();

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Checking {}", dest));

    let processed = match coordinator.process(&target, rebuild).await {
        Ok(Some(processed)) => processed,
        Ok(None) => {
            spinner.stop_error(&format!("No entry at {}", target.entry.display()));
            return Err(RollcacheError::User(format!(
                "{} has no source entry",
                args.path
            )));
        }
        Err(e) => {
            spinner.stop_error(&format!("Building {} failed", dest));
            return Err(e);
        }
    };

    if processed.rebuilt {
        spinner.stop(&format!("Built {}", dest));
    } else {
        spinner.stop(&format!("{} is up to date", dest));
    }

    if args.stdout {
        let body = match processed.outcome {
            Outcome::Served(response) => response.body,
            Outcome::Delegate => tokio::fs::read(&target.dest)
                .await
                .map_err(|e| RollcacheError::io(format!("reading {}", dest), e))?,
        };
        std::io::stdout()
            .write_all(&body)
            .map_err(|e| RollcacheError::io("writing bundle to stdout", e))?;
    }

    Ok(())
}
