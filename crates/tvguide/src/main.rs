//! `tvguide`: the CRT overlay by default, plus guide, player and diagnostic
//! subcommands.

mod channels;
mod cli;
mod paths;
mod run;
mod simulate;

use anyhow::Result;
use cli::{Command, ConfigAction};
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Guide(args)) => channels::run_guide(args, &AppPaths::discover()?),
        Some(Command::Play(args)) => channels::run_play(args, &AppPaths::discover()?),
        Some(Command::Videos(args)) => channels::run_videos(args),
        Some(Command::Simulate(args)) => {
            let paths = AppPaths::discover()?;
            let config = run::load_overlay_config(cli.run.config.as_deref(), &paths)?;
            simulate::simulate(&args, &config).map(|_| ())
        }
        Some(Command::Config(config_cmd)) => handle_config_command(config_cmd.action),
        None => run::run(cli.run),
    }
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    let paths = AppPaths::discover()?;
    match action {
        ConfigAction::Where => run_config_where(&paths),
    }
}

fn run_config_where(paths: &AppPaths) -> Result<()> {
    let status = |path: &std::path::Path| if path.is_file() { "present" } else { "built-in defaults" };
    let overlay = paths.overlay_config();
    let lineup = paths.lineup_file();
    println!("Configuration directories:");
    println!("  config:   {}", paths.config_dir().display());
    println!("Files:");
    println!("  overlay:  {} ({})", overlay.display(), status(&overlay));
    println!("  lineup:   {} ({})", lineup.display(), status(&lineup));
    Ok(())
}
