// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Terminal color utilities
//!
//! Provides consistent color schemes across the CLI.

use colored::{Color, Colorize};

const STEP_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Blue,
    Color::Yellow,
    Color::Green,
    Color::BrightCyan,
];

/// Turn colors off when `NO_COLOR` is set or stdout is not a terminal
pub fn init() {
    if !should_use_colors() {
        colored::control::set_override(false);
    }
}

/// Check if colors should be used
pub fn should_use_colors() -> bool {
    // Respect NO_COLOR environment variable
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    console::Term::stdout().features().colors_supported()
}

/// Stable color for a step label, so interleaved output stays readable
pub fn step_color(label: &str) -> Color {
    let hash = label
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    STEP_COLORS[hash % STEP_COLORS.len()]
}

/// `[pipeline.step]` prefix for output lines
pub fn step_prefix(pipeline: &str, step: &str) -> colored::ColoredString {
    let label = format!("{}.{}", pipeline, step);
    format!("[{}]", label).color(step_color(&label))
}

/// Print a styled header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.chars().count().max(40)));
}

/// Print a styled section
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print a warning
pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}

/// Print an info item
pub fn print_info(msg: &str) {
    println!("  {} {}", "→".blue(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_color_is_stable() {
        assert_eq!(step_color("dev.go"), step_color("dev.go"));
        let distinct: std::collections::HashSet<_> = ["a.x", "b.y", "c.z", "d.w", "e.v"]
            .iter()
            .map(|l| format!("{:?}", step_color(l)))
            .collect();
        assert!(distinct.len() > 1);
    }
}
