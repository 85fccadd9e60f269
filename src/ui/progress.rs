//! Spinners and build progress with plain fallbacks

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// A task spinner; prints a single line per state outside a terminal
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }
}

/// Progress of an engine build.
///
/// Understands Podman's `STEP n/m: INSTRUCTION` lines and the
/// `#k [n/m] INSTRUCTION` lines of Docker's plain progress output.
pub struct BuildProgress {
    bar: Option<ProgressBar>,
}

impl BuildProgress {
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(0);
            let template = ProgressStyle::default_bar()
                .template("  {spinner:.blue} Building {prefix}  {bar:20.blue/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(template.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ").progress_chars("━╸─"));
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Building {}...", label);
            None
        };
        Self { bar }
    }

    /// Feed one line of engine output
    pub fn on_line(&self, line: String) {
        let trimmed = line.trim();
        if let Some((n, total, instruction)) = parse_step_line(trimmed) {
            match self.bar {
                Some(ref bar) => {
                    bar.set_length(total);
                    bar.set_position(n);
                    bar.set_message(shorten(instruction));
                }
                None => println!("  STEP {}/{}: {}", n, total, instruction),
            }
        } else if let Some(ref bar) = self.bar {
            if !trimmed.is_empty() && !is_build_noise(trimmed) {
                bar.set_message(shorten(trimmed));
            }
        }
    }

    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

fn shorten(text: &str) -> String {
    if text.chars().count() > 60 {
        let head: String = text.chars().take(57).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Engine bookkeeping lines not worth showing
fn is_build_noise(line: &str) -> bool {
    line.starts_with("-->")
        || line.starts_with("--->")
        || line.starts_with("COMMIT")
        || line.starts_with("Removing intermediate")
        || line.contains("[internal]")
}

/// Parse `STEP n/m: X` (Podman) or `#k [n/m] X` (Docker)
fn parse_step_line(line: &str) -> Option<(u64, u64, &str)> {
    if let Some(rest) = line.strip_prefix("STEP ") {
        let (counts, instruction) = rest.split_once(':')?;
        let (n, total) = parse_counts(counts)?;
        return Some((n, total, instruction.trim()));
    }

    let rest = line.strip_prefix('#')?;
    let (_, rest) = rest.split_once(' ')?;
    let rest = rest.strip_prefix('[')?;
    let (counts, instruction) = rest.split_once(']')?;
    let (n, total) = parse_counts(counts.trim())?;
    Some((n, total, instruction.trim()))
}

fn parse_counts(counts: &str) -> Option<(u64, u64)> {
    let (n, total) = counts.split_once('/')?;
    Some((n.trim().parse().ok()?, total.trim().parse().ok()?))
}
