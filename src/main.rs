use clap::Parser;
use httpbind::cli::errors::print_error_with_json;
use httpbind::cli::{parse_args, render, tracing_init, Cli, Commands};
use httpbind::client::ClientBuilder;
use httpbind::config::EngineConfig;
use httpbind::error::Error;
use httpbind::invocation::Invocation;
use httpbind::metadata::loader::load_definitions;

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;
    tracing_init::init_tracing(cli.verbosity);

    if let Err(e) = run_command(cli) {
        print_error_with_json(&e, json_errors);
        std::process::exit(1);
    }
}

fn run_command(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Describe { definitions } => {
            let definitions = load_definitions(&definitions)?;
            print!("{}", render::describe(&definitions));
        }
        Commands::Call {
            definitions,
            interface,
            method,
            args,
            endpoint,
            config,
            dry_run,
        } => {
            let config = config.map_or_else(|| Ok(EngineConfig::default()), EngineConfig::load)?;
            let mut builder = ClientBuilder::new(config).definitions(load_definitions(&definitions)?);
            if let Some(endpoint) = endpoint {
                builder = builder.endpoint(endpoint);
            }
            let client = builder.build()?;

            let metadata = client.metadata(&interface, &method)?;
            let invocation = Invocation::new(metadata.id.clone(), parse_args(&metadata, &args)?);
            if dry_run {
                println!("{}", render::request(&client.build_request(&invocation)?));
                return Ok(());
            }
            let reply = client.invoke(invocation)?.into_reply()?;
            if let Some(text) = render::reply(&reply) {
                println!("{text}");
            }
        }
    }
    Ok(())
}
