//! Listing parse and series reconciliation throughput

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::fmt::Write as _;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use opcg_catalog::application::ImportService;
use opcg_catalog::domain::card::CardDraft;
use opcg_catalog::domain::language::Language;
use opcg_catalog::domain::reconciliation::assign_version_indices;
use opcg_catalog::domain::series::{SeriesDraft, SeriesType};
use opcg_catalog::infrastructure::{
    CatalogRepository, DatabaseConnection, ImportRunRepository, ListingParser, ListingSelectors,
};

const BASE: &str = "https://cards.example.test/cardlist/";
const CARDS_PER_SERIES: usize = 144;

/// A booster-sized listing where every tenth card also has a parallel print
fn listing_html() -> String {
    let mut html = String::from(r#"<html><body><div class="resultCol">"#);
    for i in 1..=CARDS_PER_SERIES {
        let number = format!("OP01-{i:03}");
        let prints = if i % 10 == 0 { 2 } else { 1 };
        for p in 0..prints {
            let id = if p == 0 { number.clone() } else { format!("{number}_p{p}") };
            let _ = write!(
                html,
                r#"<dl class="modalCol" id="{id}"><dt><div class="infoCol"><span>{number}</span><span>C</span><span>CHARACTER</span></div>
                <div class="cardName">Card {i}</div></dt><dd>
                <div class="frontCol"><img data-src="../images/{id}.png"></div>
                <div class="cost"><h3>コスト</h3>{cost}</div>
                <div class="power"><h3>パワー</h3>5000</div>
                <div class="color"><h3>色</h3>赤/緑</div>
                <div class="getInfo"><h3>入手情報</h3>ブースターパック</div>
                </dd></dl>"#,
                cost = i % 10
            );
        }
    }
    html.push_str("</div></body></html>");
    html
}

fn parse_cards(html: &str) -> Vec<CardDraft> {
    let parser =
        ListingParser::new(&ListingSelectors::default(), BASE, Language::Jp).expect("default selectors compile");
    parser.parse_cards(html)
}

fn bench_parse(c: &mut Criterion) {
    let html = listing_html();
    c.bench_function("parse_listing", |b| b.iter(|| parse_cards(black_box(&html))));

    let cards = parse_cards(&html);
    c.bench_function("assign_version_indices", |b| {
        b.iter_batched(
            || cards.clone(),
            |mut cards| assign_version_indices(black_box(&mut cards)),
            BatchSize::SmallInput,
        );
    });
}

fn bench_reconcile(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite:{}", dir.path().join("bench.db").display());
    let db = rt.block_on(async {
        let db = DatabaseConnection::new(&url).await.expect("open");
        db.migrate().await.expect("migrate");
        db
    });
    let importer = ImportService::new(
        CatalogRepository::new(db.pool().clone()),
        ImportRunRepository::new(db.pool().clone()),
        CancellationToken::new(),
    );

    let cards = parse_cards(&listing_html());
    let mut draft = SeriesDraft::new("OP-01", "ROMANCE DAWN【OP-01】", SeriesType::Booster);
    draft.official_series_id = Some("550101".to_string());

    // first pass inserts; measured passes find everything in place
    rt.block_on(importer.reconcile_series(&draft, cards.clone(), Language::Jp, false))
        .expect("initial import");

    let mut group = c.benchmark_group("reconcile");
    group.sample_size(20);
    group.bench_function("existing_series", |b| {
        b.iter(|| {
            rt.block_on(importer.reconcile_series(&draft, black_box(cards.clone()), Language::Jp, false))
                .expect("reconcile")
        });
    });
    group.finish();
}

criterion_group!(benches, bench_parse, bench_reconcile);
criterion_main!(benches);
