mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use calple::config::CalpleConfig;

fn main() {
    if let Err(error) = run() {
        eprintln!("calple error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = CalpleConfig::load()?;
    init_tracing(&config, cli.quiet, cli.verbose)?;
    cli::run(cli, &config)
}

fn init_tracing(config: &CalpleConfig, quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&config.log)?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
