mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use version_check_client::{StatusClient, WarningType, discover_base_path, resolve_base_path};
use version_check_widget::{
    DismissalMutator, RootController, StatusCache, WarningBanner, WidgetConfig, present,
};

#[derive(Parser)]
#[command(name = "version-check")]
#[command(about = "Shows and dismisses platform version warnings")]
struct Cli {
    #[arg(short, long, env = "VERSION_CHECK_URL", help = "Origin of the host application")]
    url: String,

    #[arg(
        long,
        env = "VERSION_CHECK_BASE_HREF",
        conflicts_with = "document",
        help = "Base href the host application is served under"
    )]
    base_href: Option<String>,

    #[arg(
        long,
        env = "VERSION_CHECK_DOCUMENT",
        help = "Host page to read the <base> element from"
    )]
    document: Option<PathBuf>,

    #[arg(long, env = "VERSION_CHECK_TIMEOUT_SECS", help = "Request timeout in seconds")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show the current version status")]
    Status {
        #[arg(long, help = "Print the raw status response")]
        json: bool,
    },
    #[command(about = "Dismiss a version warning")]
    Dismiss {
        #[arg(help = "Warning type (eom, eobs)", value_parser = parse_warning_type)]
        warning: WarningType,
    },
    #[command(about = "Keep the widget mounted and redraw on changes")]
    Watch {
        #[arg(
            long,
            env = "VERSION_CHECK_REFRESH_SECS",
            default_value_t = 300,
            help = "Background refresh interval in seconds"
        )]
        refresh_secs: u64,
    },
}

fn parse_warning_type(value: &str) -> Result<WarningType, String> {
    match value {
        "eom" => Ok(WarningType::Eom),
        "eobs" => Ok(WarningType::Eobs),
        "yanked" => Ok(WarningType::Yanked),
        other => Err(format!(
            "Unknown warning type '{other}'. Expected one of: eom, eobs, yanked"
        )),
    }
}

async fn build_client(cli: &Cli) -> Result<StatusClient> {
    let mut client = StatusClient::new(cli.url.as_str());
    if let Some(secs) = cli.timeout_secs {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(secs))
            .build()
            .context("Failed to build HTTP client")?;
        client = client.with_client(http);
    }

    let client = if let Some(href) = &cli.base_href {
        let base_path = resolve_base_path(&cli.url, Some(href))?;
        client.with_base_path(base_path)
    } else if let Some(path) = &cli.document {
        let document = fs::read_to_string(path)
            .with_context(|| format!("Failed to read host page {}", path.display()))?;
        client.with_base_path(discover_base_path(&cli.url, &document)?)
    } else {
        match client.clone().with_discovered_base_path().await {
            Ok(discovered) => discovered,
            Err(e) => {
                log::warn!("Could not read host page, assuming root base path: {e}");
                client
            }
        }
    };

    log::info!("Using version check API at {}", client.base_url());
    Ok(client)
}

async fn watch(client: StatusClient, refresh_secs: u64, color: bool) -> Result<()> {
    let config = WidgetConfig::default().with_refetch_interval(Duration::from_secs(refresh_secs));
    let mut controller = RootController::mount(Arc::new(client), config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut drawn: Option<WarningBanner> = None;

    println!("Watching version status. Commands: d = dismiss, r = refresh, q = quit");

    loop {
        tokio::select! {
            state = controller.changed() => {
                if state.is_none() {
                    break;
                }
            }
            line = lines.next_line() => {
                match line?.as_deref().map(str::trim) {
                    None | Some("q") => break,
                    Some("r") => {
                        controller.cache().invalidate();
                    }
                    Some("d") => match controller.dismiss().await {
                        Ok(result) => println!("{}", result.message),
                        Err(e) => {
                            eprintln!("{}", render::notice(&e.to_string(), color));
                            eprintln!("Press Enter to continue");
                            lines.next_line().await?;
                        }
                    },
                    Some("") => {}
                    Some(other) => println!("Unknown command '{other}'"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }

        let banner = controller.render();
        if banner != drawn {
            match &banner {
                Some(banner) => println!(
                    "\n{}",
                    render::banner(banner, controller.current_version(), color)
                ),
                None if drawn.is_some() => println!("\n(version warning cleared)"),
                None => {}
            }
            drawn = banner;
        }
    }

    controller.unmount();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let color = std::io::stdout().is_terminal();
    let client = build_client(&cli).await?;

    match cli.command {
        Commands::Status { json } => {
            let response = client.fetch_status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                let current_version = response.status.current_version.as_deref();
                match response.warning() {
                    Some(warning) => {
                        let banner = present(warning, response.dismissal_periods(), false);
                        println!("{}", render::banner(&banner, current_version, color));
                    }
                    None => println!(
                        "No active version warnings (current version: {})",
                        current_version.unwrap_or("unknown")
                    ),
                }
            }
        }

        Commands::Dismiss { warning } => {
            let cache = StatusCache::new(Arc::new(client), WidgetConfig::default());
            let mutator = DismissalMutator::new(cache.clone());

            let result = mutator.dismiss(warning).await?;
            match result.dismissed_until {
                Some(until) => println!("{} (until {})", result.message, until.format("%Y-%m-%d")),
                None => println!("{}", result.message),
            }

            let snapshot = cache.refresh().await;
            if let Some(e) = &snapshot.error {
                log::warn!("Could not re-read version status: {e}");
            } else if let Some(remaining) = snapshot.data.as_ref().and_then(|d| d.warning()) {
                let periods = snapshot
                    .data
                    .as_ref()
                    .map(|d| d.dismissal_periods())
                    .unwrap_or_default();
                let banner = present(remaining, periods, false);
                println!("{}", render::banner(&banner, None, color));
            } else {
                println!("No active version warnings");
            }
        }

        Commands::Watch { refresh_secs } => {
            watch(client, refresh_secs, color).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_warning_types() {
        assert_eq!(parse_warning_type("eom"), Ok(WarningType::Eom));
        assert_eq!(parse_warning_type("eobs"), Ok(WarningType::Eobs));
        assert_eq!(parse_warning_type("yanked"), Ok(WarningType::Yanked));
        assert!(parse_warning_type("EOM").is_err());
    }

    #[test]
    fn base_href_and_document_conflict() {
        let result = Cli::try_parse_from([
            "version-check",
            "--url",
            "http://localhost:8080",
            "--base-href",
            "/airflow/",
            "--document",
            "index.html",
            "status",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn watch_defaults_to_five_minute_refresh() {
        let cli = Cli::try_parse_from(["version-check", "--url", "http://localhost", "watch"]).unwrap();
        match cli.command {
            Commands::Watch { refresh_secs } => assert_eq!(refresh_secs, 300),
            _ => panic!("expected watch command"),
        }
    }
}
