//! `opcg` command line

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use opcg_catalog::application::{
    CatalogService, EnrichmentService, ImportOptions, ImportService, PriceService, VerificationService,
};
use opcg_catalog::domain::language::Language;
use opcg_catalog::domain::query::CardFilter;
use opcg_catalog::infrastructure::logging::{init_logging, log_system_info};
use opcg_catalog::infrastructure::{
    AppConfig, CatalogRepository, DatabaseConnection, HttpClient, ImportRunRepository, OfficialSiteSource,
    PriceApiClient, PriceRepository,
};

#[derive(Parser, Debug)]
#[command(name = "opcg", version, about = "One Piece Card Game catalog")]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "OPCG_CONFIG")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and schema
    Init,
    /// Import series listings from the official card list
    Scrape {
        #[arg(long, default_value = "jp")]
        lang: Language,
        /// Only this series code (e.g. OP-01)
        #[arg(long)]
        series: Option<String>,
        /// Skip series that already have versions
        #[arg(long)]
        skip_populated: bool,
        /// Clear the language and import everything again
        #[arg(long, conflicts_with_all = ["series", "skip_populated"])]
        full: bool,
        /// Overwrite text of cards that already exist
        #[arg(long)]
        refresh_text: bool,
    },
    /// Back-fill version details from the listings
    Enrich {
        #[arg(value_enum)]
        what: EnrichTarget,
        #[arg(long, default_value = "jp")]
        lang: Language,
        #[arg(long)]
        series: Option<String>,
    },
    /// Record today's market prices
    Prices {
        /// Only cards whose primary series has this code
        #[arg(long)]
        series: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Compare stored counts with the official listing sizes
    Verify {
        #[arg(long, default_value = "jp")]
        lang: Language,
        /// Re-import series below the rescrape threshold
        #[arg(long)]
        rescrape: bool,
        /// Use the counts the source shows instead of the built-in table.
        /// Always on for `en`, which has no table.
        #[arg(long)]
        live: bool,
    },
    /// Catalog statistics
    Status,
    /// Move cards filed under a series of the other language
    Repair,
    /// Delete every card of one language
    Clear {
        #[arg(long)]
        lang: Language,
        #[arg(long)]
        yes: bool,
    },
    /// List series grouped by type
    Series {
        #[arg(long, default_value = "jp")]
        lang: Language,
    },
    /// Show every version of a card
    Card {
        number: String,
        #[arg(long, default_value = "jp")]
        lang: Language,
    },
    /// Show the cards of one series
    Browse {
        code: String,
        #[arg(long, default_value = "jp")]
        lang: Language,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long)]
        card_type: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        rarity: Option<String>,
        #[arg(long)]
        illustration: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EnrichTarget {
    SourceInfo,
    Illustration,
}

struct App {
    config: AppConfig,
    catalog: CatalogRepository,
    runs: ImportRunRepository,
    prices: PriceRepository,
    cancel: CancellationToken,
    json: bool,
}

impl App {
    fn http(&self) -> Result<Arc<HttpClient>> {
        Ok(Arc::new(HttpClient::new(self.config.http.clone())?))
    }

    fn official_source(&self, language: Language) -> Result<OfficialSiteSource> {
        OfficialSiteSource::new(
            self.http()?,
            self.config.sources.official(language).clone(),
            language,
            self.cancel.clone(),
        )
    }

    fn import_options(&self) -> ImportOptions {
        ImportOptions::from(&self.config.import)
    }

    fn series_delay(&self) -> Duration {
        Duration::from_millis(self.config.import.series_delay_ms)
    }

    fn print<T: Serialize + std::fmt::Debug>(&self, value: &T) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{value:#?}");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging, &config.log_dir())?;
    log_system_info();

    let database = DatabaseConnection::new(&config.database.url).await?;
    database.migrate().await?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            signal_token.cancel();
        }
    });

    let pool = database.pool().clone();
    let app = App {
        config,
        catalog: CatalogRepository::new(pool.clone()),
        runs: ImportRunRepository::new(pool.clone()),
        prices: PriceRepository::new(pool),
        cancel,
        json: cli.json,
    };

    run(&app, cli.command).await
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Init => {
            info!("Database ready at {}", app.config.database.url);
            println!("{}", app.config.database.url);
        }
        Command::Scrape {
            lang,
            series,
            skip_populated,
            full,
            refresh_text,
        } => {
            let source = app.official_source(lang)?;
            let service = ImportService::new(app.catalog.clone(), app.runs.clone(), app.cancel.clone());
            let mut options = app.import_options();
            options.skip_populated |= skip_populated;
            options.refresh_card_text |= refresh_text;

            if full {
                app.print(&service.full_rescrape(&source, &options).await?)?;
            } else if let Some(code) = series {
                app.print(&service.import_one(&source, &code, &options).await?)?;
            } else {
                app.print(&service.import_all(&source, &options).await?)?;
            }
        }
        Command::Enrich { what, lang, series } => {
            let source = app.official_source(lang)?;
            let service = EnrichmentService::new(app.catalog.clone(), app.cancel.clone(), app.series_delay());
            let report = match what {
                EnrichTarget::SourceInfo => service.update_source_info(&source, series.as_deref()).await?,
                EnrichTarget::Illustration => service.update_illustration_types(&source, series.as_deref()).await?,
            };
            app.print(&report)?;
        }
        Command::Prices { series, limit } => {
            let price_config = app.config.sources.prices.clone();
            let service = PriceService::new(
                app.catalog.clone(),
                app.prices.clone(),
                price_config.card_language,
                Duration::from_millis(price_config.request_delay_ms),
                app.cancel.clone(),
            );
            let client = PriceApiClient::new(app.http()?, price_config, app.cancel.clone());
            app.print(&service.update_prices(&client, series.as_deref(), limit).await?)?;
        }
        Command::Verify { lang, rescrape, live } => {
            let service = VerificationService::new(app.catalog.clone(), app.runs.clone());
            let source = app.official_source(lang)?;
            let checks = service
                .check_counts(&source, live || app.config.verification.check_reported_counts)
                .await?;
            app.print(&checks)?;

            if rescrape {
                let expected: Vec<(String, i64)> = checks.iter().map(|c| (c.code.clone(), c.expected)).collect();
                let targets = service
                    .series_needing_rescrape(lang, &expected, app.config.verification.rescrape_threshold)
                    .await?;
                if targets.is_empty() {
                    info!("Nothing to rescrape");
                    return Ok(());
                }
                let codes: HashSet<String> = targets.into_iter().map(|t| t.code).collect();
                let importer = ImportService::new(app.catalog.clone(), app.runs.clone(), app.cancel.clone());
                app.print(&importer.import_codes(&source, &codes, &app.import_options()).await?)?;
            }
        }
        Command::Status => {
            let service = VerificationService::new(app.catalog.clone(), app.runs.clone());
            app.print(&service.status().await?)?;
        }
        Command::Repair => {
            let service = VerificationService::new(app.catalog.clone(), app.runs.clone());
            app.print(&service.repair_misfiled().await?)?;
        }
        Command::Clear { lang, yes } => {
            if !yes {
                bail!("Refusing to clear {lang} data without --yes");
            }
            let mut tx = app.catalog.begin().await?;
            let report = tx.clear_language(lang).await?;
            tx.commit().await?;
            warn!(
                "Cleared {}: {} cards, {} versions, {} prices",
                lang, report.cards, report.versions, report.prices
            );
        }
        Command::Series { lang } => {
            let service = CatalogService::new(app.catalog.clone(), app.config.catalog.per_page);
            app.print(&service.series_groups(lang).await?)?;
        }
        Command::Card { number, lang } => {
            let service = CatalogService::new(app.catalog.clone(), app.config.catalog.per_page);
            app.print(&service.card_versions(&number, lang).await?)?;
        }
        Command::Browse {
            code,
            lang,
            page,
            card_type,
            color,
            rarity,
            illustration,
        } => {
            let service = CatalogService::new(app.catalog.clone(), app.config.catalog.per_page);
            let filter = CardFilter {
                card_type,
                color,
                rarity,
                illustration_type: illustration,
                star_mark: None,
            };
            app.print(&service.series_view(&code, lang, &filter, page).await?)?;
        }
    }
    Ok(())
}
