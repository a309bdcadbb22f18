// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Init command - create a pipeline script

use colored::Colorize;
use miette::Result;

use super::Session;
use crate::templates::TemplateStore;
use crate::utils::print_success;

/// Run the init command
pub async fn run(session: &Session, template: Option<String>, force: bool) -> Result<()> {
    let config = session.config()?;
    let target = config.script_path(None);

    // The built-in template needs no store, so a missing home is fine here
    let store = match &template {
        Some(_) => session.store()?,
        None => session
            .store()
            .unwrap_or_else(|_| TemplateStore::new(".")),
    };
    store.init_script(template.as_deref(), &target, force)?;

    let source = template.as_deref().unwrap_or("built-in template");
    print_success(&format!("Created {} from {}", target.display(), source));
    println!();
    println!("Next steps:");
    println!("  {} to check it", "pipeflow validate".cyan());
    println!("  {} to run it", "pipeflow run".cyan());
    Ok(())
}
