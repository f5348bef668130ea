//! Bulwark — site backend for consent management and privacy requests.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("BULWARK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn print_help() {
    println!("Bulwark — consent management backend");
    println!();
    println!("Usage: bulwark [command]");
    println!();
    println!("Commands:");
    println!("  (none)                   Start the server");
    println!("  consent <action>         Inspect or change the stored consent record");
    println!("  privacy <action>         File a data deletion or unsubscribe request");
    println!("  help                     Show this help message");
    println!();
    println!("{}", cli::USAGE);
    println!();
    println!("{}", cli::PRIVACY_USAGE);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = cli::Command::parse(&args);

    if !command.needs_config() {
        if let cli::Command::Unknown(name) = &command {
            eprintln!("Unknown command: {}. Use 'bulwark help' for usage.", name);
            std::process::exit(1);
        }
        print_help();
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    let config = bulwark_core::SiteConfig::from_env(&data_dir)?;

    // Handle CLI subcommands
    match command {
        cli::Command::Consent => {
            match cli::run(&config, &args[2..]) {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
            return Ok(());
        }
        cli::Command::Privacy => {
            match cli::run_privacy(&config, &args[2..]).await {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
            return Ok(());
        }
        _ => {}
    }

    info!("Data directory: {}", data_dir.display());
    let port = config.port;

    let state = Arc::new(AppState::new(config));
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Bulwark server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
