use clap::Parser;
use termwire::config::{self, Cli, Command};
use termwire::error::TermResult;
use termwire::{attach, endpoint, logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Attach(args) => run_attach(args).await?,
        Command::Endpoint(args) => run_endpoint(args)?,
    }
    Ok(())
}

async fn run_attach(args: config::AttachArgs) -> TermResult<()> {
    let config = config::Config::load(&args.common)?;
    logging::init(&config.logging);
    attach::run(&config, &args).await
}

fn run_endpoint(args: config::CommonArgs) -> TermResult<()> {
    let config = config::Config::load(&args)?;
    logging::init(&config.logging);
    println!("{}", endpoint::resolve(&config.broker)?);
    Ok(())
}
