// labnotes - laboratory entry search and condition templates
// Entry point: loads settings, starts logging, prints command replies as JSON

use anyhow::Context;
use clap::{Parser, Subcommand};
use labnotes::app::AppState;
use labnotes::commands::{self, NlSearchRequest, PageRequest};
use labnotes::logging;
use labnotes::search::FilterCriteria;
use labnotes::services::SettingsService;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labnotes")]
#[command(author, version, about = "Search laboratory entries and condition templates")]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding settings.json, the database and taxonomies
    #[arg(long, env = "LABNOTES_DATA_DIR", default_value = "labnotes-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search with a free-text query
    Search {
        /// The query, e.g. "entries by john from last week"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Filter entries by field
    Filter {
        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        hash_id: Option<String>,

        #[arg(long)]
        text: Option<String>,

        /// Comma-separated; every tag must match
        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        title: Option<String>,

        /// Matched against name, tags, conditions and text
        #[arg(long)]
        keyword: Option<String>,

        /// Earliest date, YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,

        /// Latest date, YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,

        /// Return one page starting here instead of every match
        #[arg(long)]
        offset: Option<i64>,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show a user's condition templates
    Templates {
        #[arg(short, long)]
        author: String,

        /// Show one template against this method's taxonomy
        #[arg(short, long, requires = "method")]
        template: Option<String>,

        #[arg(short, long)]
        method: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings_service = SettingsService::new(cli.data_dir.clone());
    let mut settings = settings_service
        .load()
        .await
        .with_context(|| format!("loading {:?}", settings_service.settings_path()))?;
    settings.resolve_paths(&cli.data_dir);

    let _log_guard = logging::init(&settings.logging)?;
    tracing::info!("Starting labnotes {}", env!("CARGO_PKG_VERSION"));

    let state = AppState::initialize(&settings)
        .await
        .context("initialising application state")?;

    match cli.command {
        Commands::Search { query } => {
            let request = NlSearchRequest {
                query: query.join(" "),
            };
            print_json(&commands::nl_search(&state, request).await)?;
        }
        Commands::Filter {
            author,
            hash_id,
            text,
            tags,
            title,
            keyword,
            from,
            to,
            offset,
            limit,
        } => {
            let criteria = FilterCriteria {
                date_bool: from.is_some() || to.is_some(),
                author,
                hash_id,
                text,
                tags,
                title,
                keyword,
                date_start: from,
                date_end: to,
            };

            if offset.is_some() || limit.is_some() {
                let page = PageRequest { offset, limit };
                print_json(&commands::realtime_filter_entries(&state, &criteria, page).await)?;
            } else {
                print_json(&commands::filter_entries(&state, &criteria).await)?;
            }
        }
        Commands::Templates {
            author,
            template,
            method,
        } => match (template, method) {
            (Some(template), Some(method)) => {
                let reply =
                    commands::conditions_by_template_and_method(&state, &author, &template, &method)
                        .await;
                print_json(&reply)?;
            }
            _ => print_json(&commands::list_templates(&state, &author).await)?,
        },
    }

    Ok(())
}
