use anyhow::{Context, Result};

use bsky_session::config::{CliArgs, Command};
use bsky_session::{ApiRequest, AuthSession, BootstrapSource};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::load();

    // Logs go to stderr so stdout carries only command output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = args.session_config()?;
    tracing::debug!(
        base_url = %config.base_url,
        session_file = %config.session_file.display(),
        retry_budget = config.retry_budget,
        "Session configured"
    );

    tracing::info!("Initializing session...");
    let session = AuthSession::connect(config)
        .await
        .context("Failed to establish session")?;

    match args.command {
        Command::Login => {
            let source = match session.bootstrap_source() {
                BootstrapSource::Loaded => "loaded from file",
                BootstrapSource::Created => "newly created",
            };
            println!(
                "Logged in as {} ({})",
                session.did().await.unwrap_or_else(|| "<unknown did>".to_string()),
                source
            );
        }
        Command::Call {
            endpoint,
            method,
            json,
            params,
            headers,
        } => {
            let mut request = ApiRequest::get(endpoint)
                .with_method_name(&method)?
                .with_params(params);

            if let Some(json) = json {
                let body: serde_json::Value =
                    serde_json::from_str(&json).context("--json is not valid JSON")?;
                request = request.with_json(body);
            }
            for (name, value) in headers {
                request = request.with_header(name, value);
            }

            let result = session.call(request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Refresh => {
            session.recover().await.context("Failed to refresh session")?;
            println!(
                "Session refreshed for {}",
                session.did().await.unwrap_or_else(|| "<unknown did>".to_string())
            );
        }
        Command::Logout => {
            session.logout().await?;
            println!("Logged out");
        }
    }

    Ok(())
}
