//! Daily price collection

mod common;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{fast_options, starter_and_booster, FakePriceSource, TestDb};
use opcg_catalog::application::PriceService;
use opcg_catalog::domain::card::VersionType;
use opcg_catalog::domain::language::Language;
use opcg_catalog::domain::price::{NewPrice, PriceQuote};

async fn imported() -> Result<TestDb> {
    let t = TestDb::new().await?;
    t.importer()
        .import_all(&starter_and_booster(Language::Jp), &fast_options())
        .await?;
    Ok(t)
}

fn service(t: &TestDb) -> PriceService {
    PriceService::new(
        t.catalog(),
        t.prices(),
        Language::Jp,
        Duration::ZERO,
        CancellationToken::new(),
    )
}

fn price_source() -> FakePriceSource {
    let mut source = FakePriceSource::new()
        .quote("OP01-001", "Roronoa Zoro", Some(2.5))
        .quote("OP01-001", "Roronoa Zoro (Alternate Art)", Some(40.0))
        .quote("OP01-002", "Nami", None)
        .quote("OP01-003", "Nico Robin", Some(0.0));
    source
        .quotes
        .insert("ST01-002".to_string(), vec![PriceQuote::new("P-999", "Promo", Some(1.0))]);
    source.failing.insert("ST01-003".to_string());
    source
}

#[tokio::test]
async fn prices_land_on_the_matching_version() -> Result<()> {
    let t = imported().await?;
    let report = service(&t).update_prices(&price_source(), None, None).await?;

    assert_eq!(report.cards_checked, 6);
    assert_eq!(report.quotes_seen, 5);
    assert_eq!(report.recorded, 2);
    assert_eq!(report.no_price, 2);
    assert_eq!(report.unknown_cards, 1);
    assert_eq!(report.failed_cards, vec!["ST01-003".to_string()]);

    let catalog = t.catalog();
    let zoro = catalog.find_card("OP01-001", Language::Jp).await?.expect("card");
    let versions = catalog.versions_for_card(zoro.id).await?;
    let normal = versions.iter().find(|v| v.version_type == VersionType::Normal).expect("normal");
    let alt = versions.iter().find(|v| v.version_type == VersionType::AltArt).expect("alt");

    let prices = t.prices();
    let normal_price = prices.latest_price(normal.id).await?.expect("normal price");
    assert!((normal_price.price - 2.5).abs() < f64::EPSILON);
    assert_eq!(normal_price.currency, "USD");
    assert_eq!(normal_price.source, "optcg_api");
    assert_eq!(normal_price.condition, "unsealed");
    assert_eq!(normal_price.price_type, "average");

    let alt_price = prices.latest_price(alt.id).await?.expect("alt price");
    assert!((alt_price.price - 40.0).abs() < f64::EPSILON);
    assert_eq!(alt_price.display_price(), "$40.00");
    Ok(())
}

#[tokio::test]
async fn one_price_per_version_per_day() -> Result<()> {
    let t = imported().await?;
    let service = service(&t);
    let source = price_source();

    service.update_prices(&source, None, None).await?;
    let again = service.update_prices(&source, None, None).await?;
    assert_eq!(again.recorded, 0);
    assert_eq!(again.duplicates, 2);
    assert_eq!(t.prices().count_for_source("optcg_api").await?, 2);
    Ok(())
}

#[tokio::test]
async fn series_filter_and_limit_restrict_cards() -> Result<()> {
    let t = imported().await?;
    let service = service(&t);
    let source = FakePriceSource::new();

    let starter = service.update_prices(&source, Some("ST-01"), None).await?;
    assert_eq!(starter.cards_checked, 3);

    let limited = service.update_prices(&source, None, Some(2)).await?;
    assert_eq!(limited.cards_checked, 2);
    Ok(())
}

#[tokio::test]
async fn history_keeps_one_row_per_day() -> Result<()> {
    let t = imported().await?;
    let card = t.catalog().find_card("ST01-001", Language::Jp).await?.expect("card");
    let version = t.catalog().versions_for_card(card.id).await?.remove(0);
    let prices = t.prices();

    let price = NewPrice {
        version_id: version.id,
        source: "manual".to_string(),
        currency: "JPY".to_string(),
        price: 1200.0,
        condition: "unsealed".to_string(),
        price_type: "lowest".to_string(),
        listing_count: Some(4),
        source_url: None,
    };
    let now = Utc::now();
    assert!(prices.record_daily_price_at(&price, now - ChronoDuration::days(1)).await?);
    assert!(prices.record_daily_price_at(&price, now).await?);
    assert!(!prices.record_daily_price_at(&price, now).await?);

    let history = prices.price_history(version.id, Some("manual")).await?;
    assert_eq!(history.len(), 2);
    assert!(history[0].recorded_at < history[1].recorded_at);
    assert_eq!(history[1].display_price(), "¥1,200");
    assert!(prices.price_history(version.id, Some("optcg_api")).await?.is_empty());
    Ok(())
}
