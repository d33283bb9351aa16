//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = ProgressBar::new_spinner();
            if let Ok(spinner_style) = ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            {
                spinner.set_style(spinner_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            spinner.set_message(message.to_string());
            spinner.enable_steady_tick(Duration::from_millis(120));
            self.spinner = Some(spinner);
        } else {
            eprintln!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        self.finish();
        if self.interactive {
            eprintln!("{} {}", style("✓").green(), message);
        } else {
            eprintln!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        self.finish();
        if self.interactive {
            eprintln!("{} {}", style("✗").red(), message);
        } else {
            eprintln!("{} {}", style("[FAIL]").red(), message);
        }
    }

    fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}
