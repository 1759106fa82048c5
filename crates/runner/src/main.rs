use log::{error, info};
use tame_order_manager::EngineConfig;
use tame_runner::{Dispatcher, Reply, bootstrap};
use tokio::io::{AsyncBufReadExt, BufReader};

fn print_help() {
    eprintln!(
        r#"tame - interactive order console

USAGE:
    tame [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Paper session on a demo BTC/USD market
    tame

    # Emulate the venue and markets described in a config file
    tame --config tame.json
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            EngineConfig::from_file(&path)?
        }
        None => {
            info!("Using demo configuration");
            bootstrap::demo_config()
        }
    };
    let first_market = config.markets.first().map(|m| m.symbol.clone());

    let (_gateway, engine) = bootstrap::paper_engine(config)?;
    let mut dispatcher = Dispatcher::new(engine);

    if let Some(symbol) = first_market {
        if let Reply::Line(line) = dispatcher.handle_line(&format!("market {}", symbol)).await {
            println!("{}", line);
        }
    }
    println!("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };
        match dispatcher.handle_line(&line).await {
            Reply::Line(reply) => println!("{}", reply),
            Reply::Silent => {}
            Reply::Quit => break,
        }
    }

    if let Some(session_id) = dispatcher.engine().active_chase().await {
        info!("Cancelling chase {} before exit", session_id);
        if let Err(e) = dispatcher.engine().cancel_chase(session_id).await {
            error!("Failed to cancel chase {}: {}", session_id, e);
        }
    }

    info!("Session ended");
    Ok(())
}
