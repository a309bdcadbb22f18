// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Template command - manage stored scripts

use colored::Colorize;
use miette::Result;

use super::{Session, TemplateAction};
use crate::utils::{print_section, print_success};

/// Run the template command
pub async fn run(session: &Session, action: TemplateAction) -> Result<()> {
    let store = session.store()?;

    match action {
        TemplateAction::Add { name, file, force } => {
            let script = session.config()?.script_path(file);
            let path = store.add(&name, &script, force)?;
            print_success(&format!("Saved {} as template '{}'", script.display(), name));
            if session.verbose {
                println!("  {}", path.display().to_string().dimmed());
            }
        }
        TemplateAction::Remove { name } => {
            store.remove(&name)?;
            print_success(&format!("Removed template '{}'", name));
        }
        TemplateAction::List => {
            let templates = store.list()?;
            let layouts = store.layouts()?;

            if templates.is_empty() && layouts.is_empty() {
                println!(
                    "No templates in {}. Save one with {}.",
                    store.root().display(),
                    "pipeflow template add <name>".cyan()
                );
                return Ok(());
            }

            print_section("Templates");
            for name in &templates {
                println!("  • {}", name);
            }
            print_section("Layouts");
            for name in &layouts {
                println!("  • {}", name);
            }
        }
    }
    Ok(())
}
