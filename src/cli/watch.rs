// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Watch command - re-run pipelines on file changes

use colored::Colorize;
use miette::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};

use super::{check, run::execute, Session};

/// Directories whose changes never trigger a run
const IGNORED_DIRS: &[&str] = &[".git", "target"];

/// Run the watch command
pub async fn run(
    session: &Session,
    target: Option<String>,
    file: Option<PathBuf>,
    debounce_ms: u64,
) -> Result<()> {
    let script = session.config()?.script_path(file.clone());
    if !script.exists() {
        return Err(miette::miette!(
            "Pipeline script not found: {}\n\n\
             Run 'pipeflow init' to create one.",
            script.display()
        ));
    }

    println!("{}", "Starting watch mode...".bold());
    println!("Watching for changes (debounce: {}ms)", debounce_ms);
    println!("Press {} to exit.", "Ctrl+C".cyan());
    println!();

    let debounce = Duration::from_millis(debounce_ms);
    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(debounce, tx)
        .map_err(|e| miette::miette!("Failed to create file watcher: {}", e))?;
    debouncer
        .watcher()
        .watch(Path::new("."), RecursiveMode::Recursive)
        .map_err(|e| miette::miette!("Failed to start watching: {}", e))?;

    run_once(session, file.clone(), target.as_deref()).await;
    discard_settled(&rx, debounce).await;

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant: Vec<&DebouncedEvent> =
                    events.iter().filter(|e| !is_ignored(&e.path)).collect();
                if relevant.is_empty() {
                    continue;
                }

                println!();
                println!("{}", "─".repeat(50).dimmed());
                println!(
                    "{}: {} file(s) changed",
                    "Change detected".yellow(),
                    relevant.len()
                );
                if session.verbose {
                    for event in &relevant {
                        println!("  {}", event.path.display());
                    }
                }
                println!();

                run_once(session, file.clone(), target.as_deref()).await;
                discard_settled(&rx, debounce).await;
            }
            Ok(Err(e)) => {
                eprintln!("{}: {:?}", "Watch error".red(), e);
            }
            Err(e) => {
                eprintln!("{}: {}", "Channel error".red(), e);
                break;
            }
        }
    }

    Ok(())
}

/// Evaluate and run the script; errors are reported, never fatal
async fn run_once(session: &Session, file: Option<PathBuf>, target: Option<&str>) {
    let start = Instant::now();

    let result = async {
        let (config, set) = session.load(file)?;
        check(&set, session.verbose)?;
        let options = config.execution_options(false, false, false);
        execute(session, &config, &set, target, &options).await
    }
    .await;

    let elapsed = start.elapsed().as_secs_f64();
    match result {
        Ok(report) if report.success => {
            println!("{} ({:.2}s)", "Run completed".green(), elapsed);
        }
        Ok(_) => {
            println!("{} ({:.2}s)", "Run failed".red(), elapsed);
        }
        Err(e) => {
            eprintln!("{:?}", e);
        }
    }
}

/// Drop the events caused by a run. Its writes are still inside the
/// debounce window when it returns, so wait that window out first.
async fn discard_settled<T>(rx: &Receiver<T>, debounce: Duration) -> usize {
    tokio::time::sleep(debounce * 2).await;
    rx.try_iter().count()
}

fn is_ignored(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => IGNORED_DIRS.iter().any(|dir| name.to_str() == Some(*dir)),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_late_events_from_a_run_are_discarded() {
        let (tx, rx) = channel();
        // Arrives after the run returned, as a debounced write would
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            tx.send("out.txt").unwrap();
            tx
        });

        let dropped = discard_settled(&rx, Duration::from_millis(100)).await;

        assert_eq!(dropped, 1);
        assert!(rx.try_recv().is_err());
        writer.join().unwrap().send("edit.rs").unwrap();
        assert_eq!(rx.try_recv(), Ok("edit.rs"));
    }

    #[test]
    fn test_ignored_paths() {
        assert!(is_ignored(Path::new("./.git/index")));
        assert!(is_ignored(Path::new("/repo/target/debug/app")));
        assert!(!is_ignored(Path::new("./src/main.rs")));
        assert!(!is_ignored(Path::new("./targets.txt")));
    }
}
