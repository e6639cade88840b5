//! Shared fixtures for integration tests: a migrated SQLite file in a temp
//! dir and in-memory sources.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use opcg_catalog::application::{ImportOptions, ImportService};
use opcg_catalog::domain::card::{CardDraft, LEADER};
use opcg_catalog::domain::language::Language;
use opcg_catalog::domain::price::PriceQuote;
use opcg_catalog::domain::series::{SeriesDraft, SeriesType};
use opcg_catalog::infrastructure::sources::{CardSource, PriceSource};
use opcg_catalog::infrastructure::{
    CatalogRepository, DatabaseConnection, ImportRunRepository, PriceRepository, UserRepository,
};

pub struct TestDb {
    // keeps the database file alive
    _dir: TempDir,
    pub db: DatabaseConnection,
}

impl TestDb {
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite:{}", dir.path().join("catalog.db").display());
        let db = DatabaseConnection::new(&url).await?;
        db.migrate().await?;
        Ok(Self { _dir: dir, db })
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.db.pool().clone())
    }

    pub fn runs(&self) -> ImportRunRepository {
        ImportRunRepository::new(self.db.pool().clone())
    }

    pub fn prices(&self) -> PriceRepository {
        PriceRepository::new(self.db.pool().clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.db.pool().clone())
    }

    pub fn importer(&self) -> ImportService {
        ImportService::new(self.catalog(), self.runs(), CancellationToken::new())
    }
}

pub fn fast_options() -> ImportOptions {
    ImportOptions {
        series_delay: Duration::ZERO,
        skip_populated: false,
        refresh_card_text: false,
    }
}

pub fn series(code: &str, official_id: &str, series_type: SeriesType) -> SeriesDraft {
    let mut draft = SeriesDraft::new(code, format!("テスト【{code}】"), series_type);
    draft.official_series_id = Some(official_id.to_string());
    draft
}

pub fn card(number: &str, name: &str, card_type: &str, rarity: &str, colors: &str) -> CardDraft {
    let mut draft = CardDraft::new(number, name);
    draft.card_type = card_type.to_string();
    draft.rarity = rarity.to_string();
    draft.colors = colors.to_string();
    draft.cost = (card_type != LEADER).then_some(3);
    draft.life = (card_type == LEADER).then_some(5);
    draft.power = Some(5000);
    draft.image_url = Some(format!("https://cards.example/{number}.png"));
    draft
}

pub fn with_source(mut draft: CardDraft, info: &str) -> CardDraft {
    draft.source_info = Some(info.to_string());
    draft
}

pub fn with_image(mut draft: CardDraft, url: &str) -> CardDraft {
    draft.image_url = Some(url.to_string());
    draft
}

/// Canned card list keyed by official series id
pub struct FakeCardSource {
    pub language: Language,
    pub series: Vec<SeriesDraft>,
    pub cards: HashMap<String, Vec<CardDraft>>,
    pub kinds: HashMap<String, HashMap<String, String>>,
    pub reported: HashMap<String, i64>,
    pub failing: HashSet<String>,
    /// When set, `series_list` fails with this message
    pub list_error: Option<String>,
    /// Cancelled while the series list is being fetched
    pub cancel_on_list: Option<CancellationToken>,
    pub card_requests: Mutex<Vec<String>>,
}

impl FakeCardSource {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            series: Vec::new(),
            cards: HashMap::new(),
            kinds: HashMap::new(),
            reported: HashMap::new(),
            failing: HashSet::new(),
            list_error: None,
            cancel_on_list: None,
            card_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_series(mut self, draft: SeriesDraft, cards: Vec<CardDraft>) -> Self {
        let id = draft.official_series_id.clone().unwrap_or_default();
        self.series.push(draft);
        self.cards.insert(id, cards);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.card_requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CardSource for FakeCardSource {
    fn language(&self) -> Language {
        self.language
    }

    async fn series_list(&self) -> Result<Vec<SeriesDraft>> {
        if let Some(token) = &self.cancel_on_list {
            token.cancel();
        }
        if let Some(message) = &self.list_error {
            return Err(anyhow!("{message}"));
        }
        Ok(self.series.clone())
    }

    async fn series_cards(&self, official_id: &str) -> Result<Vec<CardDraft>> {
        if let Ok(mut requests) = self.card_requests.lock() {
            requests.push(official_id.to_string());
        }
        if self.failing.contains(official_id) {
            return Err(anyhow!("listing {official_id} unavailable"));
        }
        Ok(self.cards.get(official_id).cloned().unwrap_or_default())
    }

    async fn illustration_types(&self, official_id: &str) -> Result<HashMap<String, String>> {
        Ok(self.kinds.get(official_id).cloned().unwrap_or_default())
    }

    async fn reported_count(&self, official_id: &str) -> Result<Option<i64>> {
        Ok(self.reported.get(official_id).copied())
    }
}

pub struct FakePriceSource {
    pub quotes: HashMap<String, Vec<PriceQuote>>,
    pub failing: HashSet<String>,
}

impl FakePriceSource {
    pub fn new() -> Self {
        Self {
            quotes: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn quote(mut self, number: &str, name: &str, price: Option<f64>) -> Self {
        self.quotes
            .entry(number.to_string())
            .or_default()
            .push(PriceQuote::new(number, name, price));
        self
    }
}

#[async_trait]
impl PriceSource for FakePriceSource {
    fn name(&self) -> &str {
        "optcg_api"
    }

    fn currency(&self) -> &str {
        "USD"
    }

    async fn quotes_for(&self, card_number: &str) -> Result<Vec<PriceQuote>> {
        if self.failing.contains(card_number) {
            return Err(anyhow!("price lookup failed for {card_number}"));
        }
        Ok(self.quotes.get(card_number).cloned().unwrap_or_default())
    }
}

/// ST-01 (leader + two characters) and OP-01, which reprints ST01-002 and
/// lists OP01-001 twice (normal and alternate art).
pub fn starter_and_booster(language: Language) -> FakeCardSource {
    FakeCardSource::new(language)
        .with_series(
            series("ST-01", "550001", SeriesType::Starter),
            vec![
                with_source(card("ST01-001", "ルフィ", LEADER, "L", "赤"), "スタートデッキ"),
                card("ST01-002", "ウソップ", "CHARACTER", "C", "赤"),
                card("ST01-003", "カルー", "CHARACTER", "UC", "赤"),
            ],
        )
        .with_series(
            series("OP-01", "550101", SeriesType::Booster),
            vec![
                with_source(card("OP01-001", "ゾロ", LEADER, "L", "赤"), "ブースターパック"),
                with_image(
                    with_source(card("OP01-001", "ゾロ", LEADER, "L", "赤"), "ブースターパック パラレル"),
                    "https://cards.example/OP01-001_p1.png",
                ),
                card("OP01-002", "ナミ", "CHARACTER", "SR", "緑"),
                card("OP01-003", "ロビン", "EVENT", "SP CARD", "紫"),
                card("ST01-002", "ウソップ", "CHARACTER", "C", "赤"),
            ],
        )
}
