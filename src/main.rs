use clap::Parser;
use anyhow::Result;
use std::io::BufRead;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use indent_patrol::{
    cli::Cli,
    config::PatrolConfig,
    notifier::TerminalNotifier,
    patrol::Patrol,
};

enum Control {
    Toggle,
    Quit,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();

    let config = cli.apply_overrides(PatrolConfig::load(cli.config.as_deref())?.apply_env());
    if let Err(err) = config.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    let watch_path = cli.get_watch_path();
    tracing::info!("Starting indent-patrol on: {}", watch_path.display());

    let notifier = Arc::new(TerminalNotifier::new(cli.output, cli.no_color));
    let mut patrol = Patrol::new(&watch_path, config, notifier);

    let (control_tx, control_rx) = mpsc::channel::<Control>();
    let quit_tx = control_tx.clone();
    ctrlc::set_handler(move || {
        let _ = quit_tx.send(Control::Quit);
    })?;
    spawn_stdin_reader(control_tx);

    if !cli.start_disabled {
        patrol.enable()?;
    }

    while let Ok(control) = control_rx.recv() {
        match control {
            Control::Toggle => {
                if let Err(err) = patrol.toggle() {
                    tracing::error!("Failed to toggle patrol: {:#}", err);
                }
            }
            Control::Quit => break,
        }
    }

    patrol.disable();
    Ok(())
}

/// `t` toggles the patrol, `q` quits
fn spawn_stdin_reader(sender: Sender<Control>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let control = match line.trim() {
                "t" | "toggle" => Control::Toggle,
                "q" | "quit" => Control::Quit,
                "" => continue,
                other => {
                    tracing::warn!("Unknown command {:?}; use 't' to toggle or 'q' to quit", other);
                    continue;
                }
            };
            if sender.send(control).is_err() {
                break;
            }
        }
    });
}
