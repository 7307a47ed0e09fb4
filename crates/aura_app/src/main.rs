use aura_app::app::{open_tracker, run, AppConfig, Cli, Command};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let config = AppConfig::from_env().unwrap_or_default();
    let command = cli.command.unwrap_or(Command::Status);
    let result = open_tracker(&config).and_then(|tracker| run(&tracker, command));
    match result {
        Ok(output) => print!("{output}"),
        Err(err) => {
            eprintln!("aura: {err:#}");
            std::process::exit(1);
        }
    }
}
