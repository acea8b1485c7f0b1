//!
//! skinadmin server binary
//! ------------------------
//! Command-line entry point for the admin API. Configuration comes from the
//! environment; `--http-port` overrides `SKINADMIN_HTTP_PORT`.

use anyhow::Result;
use std::env;

use skinadmin::config::AppConfig;

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag
            && i + 1 < args.len() {
                return args[i + 1].parse::<u16>().ok();
            }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("skinadmin server\n\nUSAGE:\n  skinadmin_server [--http-port N]\n\nOPTIONS:\n  --http-port N   HTTP API port (env: SKINADMIN_HTTP_PORT, default 3001)\n\nENVIRONMENT:\n  ADMIN_EMAIL, ADMIN_PASSWORD     operator credentials for the backend login\n  NEXT_PUBLIC_API_URL             storefront backend base URL\n  CLERK_SECRET_KEY                Clerk management API secret\n  CLERK_API_URL                   Clerk API base (default https://api.clerk.com)\n  ROLE_ADMIN_EMAIL                address always treated as admin\n  ROLE_EMAIL_SUBSTRING_MATCH      treat emails containing \"admin\" as admin (default true)\n");
        return Ok(());
    }

    let mut config = AppConfig::from_env();
    if let Some(port) = parse_port_arg(&args, "--http-port") {
        config.http_port = port;
    }
    tracing::info!("Using port: http={}", config.http_port);
    skinadmin::server::run_with_config(config).await
}
