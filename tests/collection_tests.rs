//! Users, collections, wishlists and decks

mod common;

use anyhow::Result;

use common::{fast_options, starter_and_booster, TestDb};
use opcg_catalog::application::CollectionService;
use opcg_catalog::domain::collection::{CollectionAdd, WishPriority};
use opcg_catalog::domain::deck::{NewDeck, SHARE_CODE_LEN};
use opcg_catalog::domain::errors::CatalogError;
use opcg_catalog::domain::language::Language;
use opcg_catalog::domain::price::NewPrice;
use opcg_catalog::domain::user::{NewUser, User};

struct Fixture {
    t: TestDb,
    service: CollectionService,
    user: User,
}

impl Fixture {
    async fn new() -> Result<Self> {
        let t = TestDb::new().await?;
        t.importer()
            .import_all(&starter_and_booster(Language::Jp), &fast_options())
            .await?;
        let service = CollectionService::new(t.users());
        let user = service.create_user(&new_user("luffy", "luffy@example.com")).await?;
        Ok(Self { t, service, user })
    }

    /// Versions of a card number, base print first
    async fn versions(&self, number: &str) -> Result<Vec<i64>> {
        let catalog = self.t.catalog();
        let card = catalog.find_card(number, Language::Jp).await?.expect("card");
        Ok(catalog.versions_for_card(card.id).await?.iter().map(|v| v.id).collect())
    }
}

fn new_user(username: &str, email: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        display_name: None,
    }
}

fn catalog_error(err: &anyhow::Error) -> Option<&CatalogError> {
    err.downcast_ref::<CatalogError>()
}

#[tokio::test]
async fn usernames_and_emails_are_unique() -> Result<()> {
    let f = Fixture::new().await?;

    let err = f
        .service
        .create_user(&new_user("luffy", "other@example.com"))
        .await
        .expect_err("duplicate username");
    assert!(matches!(catalog_error(&err), Some(CatalogError::DuplicateUser { field, .. }) if field == "username"));

    let err = f
        .service
        .create_user(&new_user("zoro", "luffy@example.com"))
        .await
        .expect_err("duplicate email");
    assert!(matches!(catalog_error(&err), Some(CatalogError::DuplicateUser { field, .. }) if field == "email"));

    assert_eq!(f.service.user("luffy").await?.id, f.user.id);
    assert!(f.service.user("nobody").await.is_err());
    Ok(())
}

#[tokio::test]
async fn adding_the_same_stack_increments_quantity() -> Result<()> {
    let f = Fixture::new().await?;
    let version = f.versions("OP01-002").await?[0];

    let first = f.service.add_to_collection(f.user.id, &CollectionAdd::new(version, 1)).await?;
    let second = f.service.add_to_collection(f.user.id, &CollectionAdd::new(version, 2)).await?;
    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 3);

    let graded = CollectionAdd {
        grade: Some("PSA 10".to_string()),
        ..CollectionAdd::new(version, 1)
    };
    let slab = f.service.add_to_collection(f.user.id, &graded).await?;
    assert_ne!(slab.id, first.id);
    assert_eq!(f.service.collection(f.user.id).await?.len(), 2);

    assert!(f.service.remove_from_collection(f.user.id, slab.id).await?);
    assert!(!f.service.remove_from_collection(f.user.id, slab.id).await?);
    assert_eq!(f.service.collection(f.user.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn collection_rejects_bad_input() -> Result<()> {
    let f = Fixture::new().await?;
    let version = f.versions("OP01-002").await?[0];

    let err = f
        .service
        .add_to_collection(f.user.id, &CollectionAdd::new(version, 0))
        .await
        .expect_err("zero quantity");
    assert_eq!(catalog_error(&err), Some(&CatalogError::InvalidQuantity(0)));

    let err = f
        .service
        .add_to_collection(f.user.id, &CollectionAdd::new(999_999, 1))
        .await
        .expect_err("unknown version");
    assert_eq!(catalog_error(&err), Some(&CatalogError::VersionNotFound(999_999)));
    Ok(())
}

#[tokio::test]
async fn wishlist_upserts_and_orders_by_priority() -> Result<()> {
    let f = Fixture::new().await?;
    let zoro = f.versions("OP01-001").await?;
    let nami = f.versions("OP01-002").await?[0];

    f.service.wish(f.user.id, nami, 1, None, WishPriority::Low).await?;
    f.service.wish(f.user.id, zoro[1], 1, Some(50.0), WishPriority::Medium).await?;
    let updated = f
        .service
        .wish(f.user.id, zoro[1], 2, Some(45.0), WishPriority::High)
        .await?;
    assert_eq!(updated.quantity, 2);

    let wishlist = f.service.wishlist(f.user.id).await?;
    assert_eq!(wishlist.len(), 2);
    assert_eq!(wishlist[0].version_id, zoro[1]);
    assert_eq!(wishlist[0].priority, WishPriority::High);
    assert_eq!(wishlist[0].max_price, Some(45.0));

    assert!(f.service.unwish(f.user.id, nami).await?);
    assert_eq!(f.service.wishlist(f.user.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn deck_summary_totals_leader_and_price() -> Result<()> {
    let f = Fixture::new().await?;
    let zoro = f.versions("OP01-001").await?[0];
    let nami = f.versions("OP01-002").await?[0];
    let usopp = f.versions("ST01-002").await?[0];

    let prices = f.t.prices();
    for (version_id, price) in [(zoro, 3.0), (nami, 1.5)] {
        prices
            .record_daily_price(&NewPrice {
                version_id,
                source: "optcg_api".to_string(),
                currency: "USD".to_string(),
                price,
                condition: "unsealed".to_string(),
                price_type: "average".to_string(),
                listing_count: None,
                source_url: None,
            })
            .await?;
    }

    let deck = f
        .service
        .create_deck(
            f.user.id,
            &NewDeck {
                is_public: true,
                ..NewDeck::new("Red Zoro")
            },
        )
        .await?;
    assert_eq!(deck.share_code.len(), SHARE_CODE_LEN);

    f.service.set_deck_card(deck.id, zoro, 1).await?;
    f.service.set_deck_card(deck.id, nami, 4).await?;
    f.service.set_deck_card(deck.id, usopp, 2).await?;
    f.service.set_deck_card(deck.id, nami, 3).await?;
    f.service.remove_deck_card(deck.id, usopp).await?;
    f.service.set_deck_leader(deck.id, Some(zoro)).await?;

    let summary = f.service.deck_summary(deck.id).await?;
    assert_eq!(summary.total_cards(), 4);
    assert_eq!(summary.leader().map(|c| c.card_number.as_str()), Some("OP01-001"));
    assert!((summary.estimated_price() - 7.5).abs() < 1e-9);
    assert_eq!(summary.deck.leader_version_id, Some(zoro));

    let shared = f.service.deck_by_share_code(&deck.share_code).await?;
    assert_eq!(shared.id, deck.id);
    assert_eq!(f.service.public_decks(10).await?.len(), 1);
    assert_eq!(f.service.decks_for_user(f.user.id).await?.len(), 1);

    assert!(f.service.delete_deck(deck.id).await?);
    let err = f.service.deck_summary(deck.id).await.expect_err("deleted");
    assert!(matches!(catalog_error(&err), Some(CatalogError::DeckNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn deck_cards_are_validated() -> Result<()> {
    let f = Fixture::new().await?;
    let deck = f.service.create_deck(f.user.id, &NewDeck::new("Test")).await?;

    let err = f.service.set_deck_card(deck.id, 999_999, 1).await.expect_err("unknown version");
    assert_eq!(catalog_error(&err), Some(&CatalogError::VersionNotFound(999_999)));

    let err = f.service.set_deck_card(deck.id, 1, -1).await.expect_err("negative");
    assert_eq!(catalog_error(&err), Some(&CatalogError::InvalidQuantity(-1)));

    let err = f.service.create_deck(424_242, &NewDeck::new("Ghost")).await.expect_err("no user");
    assert!(matches!(catalog_error(&err), Some(CatalogError::UserNotFound(_))));

    assert!(f.service.deck_by_share_code("ZZZZZZZZ").await.is_err());
    Ok(())
}
