use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    pages::SortKey, ClientConfig, HeadlessShell, HttpFetcher, NavigateOptions, Phase,
    PortfolioApp, ShellDocument, StateStore, StoreOptions,
};
use shared::{domain::PageKey, protocol::ContactSubmission};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,
    /// JSON file holding persisted state keys (theme) between runs.
    #[arg(long)]
    state_file: Option<PathBuf>,
    /// Debug logging; also enabled by PORTFOLIO_DEBUG=1.
    #[arg(long)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Navigate to each page key in order.
    Visit {
        #[arg(required = true)]
        pages: Vec<String>,
    },
    /// Click an in-page link, e.g. `#projects`.
    Click { href: String },
    /// Show the project catalog with filters applied.
    Projects {
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value = "complexity")]
        sort: String,
        #[arg(long)]
        min_complexity: Option<f64>,
        #[arg(long = "tech")]
        technologies: Vec<String>,
        /// Open the details of the N-th listed project (0-based).
        #[arg(long)]
        details: Option<usize>,
    },
    /// Send a message through the contact form.
    Contact {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        message: String,
    },
}

fn debug_enabled(flag: bool) -> bool {
    flag || std::env::var("PORTFOLIO_DEBUG")
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn print_page(app: &PortfolioApp, shell: &HeadlessShell) -> Result<()> {
    println!("fragment: {}", shell.fragment());
    println!("state: {}", serde_json::to_string(&app.state().snapshot())?);
    println!("{}", shell.viewport().unwrap_or_default());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if debug_enabled(cli.debug) { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let fetcher = Arc::new(HttpFetcher::new(ClientConfig::new(&cli.server_url)?)?);
    let shell = Arc::new(HeadlessShell::new());
    let state = StateStore::new(StoreOptions {
        state_file: cli.state_file.clone(),
        ..StoreOptions::default()
    });
    let app = PortfolioApp::new(fetcher.clone(), fetcher, shell.clone(), state);
    app.init().await.context("application failed to start")?;

    match cli.command {
        Command::Visit { pages } => {
            for raw in pages {
                app.router().navigate(&raw, NavigateOptions::update_url()).await;
                if app.router().settled().await == Phase::Failed {
                    eprintln!("default page could not be loaded");
                }
                print_page(&app, &shell)?;
            }
        }
        Command::Click { href } => {
            let outcome = app.handle_link_click(&href);
            println!("click {href}: {outcome:?}");
            app.router().settled().await;
            print_page(&app, &shell)?;
        }
        Command::Projects {
            query,
            sort,
            min_complexity,
            technologies,
            details,
        } => {
            app.navigate_to(PageKey::Projects).await;
            app.router().settled().await;
            let projects = &app.behaviors().projects;
            projects.update(|catalog| {
                catalog.set_query(query.as_deref().unwrap_or_default());
                catalog.set_sort(SortKey::parse(&sort));
                if let Some(min) = min_complexity {
                    catalog.set_min_complexity(min);
                }
                for tech in &technologies {
                    catalog.set_technology(tech, true);
                }
            });
            let catalog = projects.catalog();
            for chip in catalog.chips() {
                println!("filter: {chip}");
            }
            for project in catalog.filtered() {
                println!(
                    "{:<32} complexity={} impact={} {}",
                    project.title,
                    project.complexity,
                    project.impact,
                    project.technologies.join(", ")
                );
            }
            for title in catalog.suggestions() {
                println!("suggestion: {title}");
            }
            if let Some(index) = details {
                if !projects.open_details(index) {
                    anyhow::bail!("no project at position {index}");
                }
                print_page(&app, &shell)?;
            }
        }
        Command::Contact {
            name,
            email,
            message,
        } => {
            app.navigate_to(PageKey::Contact).await;
            app.router().settled().await;
            let receipt = app
                .behaviors()
                .contact
                .submit(ContactSubmission {
                    name,
                    email,
                    message,
                })
                .await?;
            println!(
                "sent: id={} at {}",
                receipt.submission_id, receipt.received_at
            );
        }
    }

    app.destroy();
    Ok(())
}
