// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Layout command - scaffold folders and files from a stored layout

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::Session;
use crate::script::Created;
use crate::utils::{create_spinner, print_info, print_success};

/// Run the layout command
pub async fn run(session: &Session, name: Option<String>, target: PathBuf) -> Result<()> {
    let store = session.store()?;

    let Some(name) = name else {
        let layouts = store.layouts()?;
        if layouts.is_empty() {
            println!(
                "No layouts in {}",
                store.root().join("layout").display()
            );
        }
        for layout in layouts {
            println!("  • {}", layout);
        }
        return Ok(());
    };

    let spinner = create_spinner(&format!("Applying layout '{}'", name));
    let created = store.apply_layout(&name, &target);
    spinner.finish_and_clear();
    let created = created?;

    for item in &created {
        match item {
            Created::Folder(path) => print_info(&format!("{}/", path.display())),
            Created::File { path, template } => print_info(&format!(
                "{} {}",
                path.display(),
                format!("(from {})", template).dimmed()
            )),
        }
    }
    print_success(&format!(
        "Layout '{}' created {} item{}",
        name,
        created.len(),
        if created.len() == 1 { "" } else { "s" }
    ));
    Ok(())
}
