use clap::Parser;
use tokengate::cli::{Args, build_config, handle_create_user, init_logging, open_database};
use tokengate::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if let Some(login) = &args.create_user
        && !handle_create_user(&db, login, &args.user_kind, args.token_policy()).await
    {
        std::process::exit(1);
    }

    let Some(config) = build_config(&args, db) else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(_) => info!(address = %addr, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
