use clap::Parser;
use memberbank::{Application, Config, telemetry};
use std::process::ExitCode;

// EX_CONFIG from sysexits.h
const EXIT_CONFIG: u8 = 78;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI args
    let args = memberbank::config::Args::parse();

    // Load configuration
    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = telemetry::init_telemetry() {
        eprintln!("Failed to initialize telemetry: {e}");
    }

    tracing::debug!("{:?}", args);

    let Some(command) = args.command else {
        eprintln!("No command given. Run with --help to see the available commands.");
        return ExitCode::from(64);
    };

    let app = match Application::new(config).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            eprintln!("{}", e.user_message());
            return ExitCode::from(e.exit_code());
        }
    };

    let result = app.run(command).await;
    app.shutdown().await;

    match result {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to render output: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("{}", e.user_message());
            ExitCode::from(e.exit_code())
        }
    }
}
