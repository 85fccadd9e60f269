//! Styled output with plain fallbacks

use super::context::UiContext;
use crate::cache::LayerStatus;
use console::style;

/// Command banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).blue().bold()).ok();
    } else {
        println!("{}", style(title).bold());
        println!();
    }
}

pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!();
        println!("{} {}", style("[OK]").green(), message);
    }
}

pub fn outro_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).yellow().bold()).ok();
    } else {
        println!();
        println!("{} {}", style("[WARN]").yellow(), message);
    }
}

pub fn outro_error(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).red().bold()).ok();
    } else {
        println!();
        println!("{} {}", style("[ERROR]").red(), message);
    }
}

/// Section header
pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        println!("  {} {}", style("[OK]").green(), message);
    }
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(format!("{} ({})", message, style(detail).dim())).ok();
    } else {
        println!("  {} {} ({})", style("[OK]").green(), message, detail);
    }
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(message).ok();
    } else {
        println!("  {} {}", style("[WARN]").yellow(), message);
    }
}

pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::error(format!("{}: {}", message, style(detail).red())).ok();
    } else {
        println!("  {} {}: {}", style("[FAIL]").red(), message, detail);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        println!("  {} {}", style("[INFO]").blue(), message);
    }
}

/// Dimmed hint line
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// One recipe step with its cache status
pub fn layer_line(ctx: &UiContext, index: usize, status: LayerStatus, label: &str) {
    let tag = format!("{:<7}", status.to_string());
    let tag = match status {
        LayerStatus::Reused => style(tag).green(),
        LayerStatus::Rebuilt => style(tag).yellow(),
    };
    if ctx.use_fancy_output() {
        println!("  {} {:>2}  {}", tag, index + 1, label);
    } else {
        println!("  [{}] {:>2}  {}", status, index + 1, label);
    }
}

/// One verification check
pub fn check_line(ctx: &UiContext, name: &str, passed: bool, detail: &str) {
    if passed {
        step_ok_detail(ctx, name, detail);
    } else {
        step_error_detail(ctx, name, detail);
    }
}
