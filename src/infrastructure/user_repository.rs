//! Users and their collections, wishlists and decks

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::domain::collection::{CollectionAdd, CollectionEntry, WishPriority, WishlistEntry};
use crate::domain::deck::{generate_share_code, Deck, DeckCard, DeckCardDetail, NewDeck};
use crate::domain::errors::CatalogError;
use crate::domain::user::{NewUser, User};

const DECK_COLUMNS: &str = "id, user_id, name, description, format, leader_version_id, is_public, \
    share_code, created_at, updated_at";

const COLLECTION_COLUMNS: &str = "id, user_id, version_id, quantity, condition, grade, purchase_price, \
    purchase_date, notes, created_at, updated_at";

const WISHLIST_COLUMNS: &str = "id, user_id, version_id, quantity, max_price, priority, notes, \
    created_at, updated_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: Arc<SqlitePool>,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    // ===============================
    // USERS
    // ===============================

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        for (field, value) in [("username", &user.username), ("email", &user.email)] {
            let sql = format!("SELECT COUNT(*) FROM users WHERE {} = ?", field);
            let taken: i64 = sqlx::query_scalar(&sql).bind(value).fetch_one(&*self.pool).await?;
            if taken > 0 {
                return Err(CatalogError::DuplicateUser {
                    field: field.to_string(),
                    value: value.clone(),
                }
                .into());
            }
        }

        let id = sqlx::query("INSERT INTO users (username, email, display_name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(Utc::now())
            .execute(&*self.pool)
            .await
            .with_context(|| format!("Failed to create user {}", user.username))?
            .last_insert_rowid();

        self.user_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::UserNotFound(user.username.clone()).into())
    }

    pub async fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, email, display_name, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, email, display_name, created_at FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&*self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn version_exists(&self, version_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM card_versions WHERE id = ?")
            .bind(version_id)
            .fetch_one(&*self.pool)
            .await?;
        Ok(count > 0)
    }

    // ===============================
    // COLLECTIONS
    // ===============================

    /// Add copies to a collection. An entry for the same version, condition
    /// and grade (grades compared null-safely) has its quantity increased.
    pub async fn add_to_collection(&self, user_id: i64, add: &CollectionAdd) -> Result<CollectionEntry> {
        let now = Utc::now();
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM user_collections \
             WHERE user_id = ? AND version_id = ? AND condition = ? AND grade IS ?",
        )
        .bind(user_id)
        .bind(add.version_id)
        .bind(&add.condition)
        .bind(&add.grade)
        .fetch_optional(&*self.pool)
        .await?;

        let id = match existing {
            Some(id) => {
                sqlx::query("UPDATE user_collections SET quantity = quantity + ?, updated_at = ? WHERE id = ?")
                    .bind(add.quantity)
                    .bind(now)
                    .bind(id)
                    .execute(&*self.pool)
                    .await?;
                id
            }
            None => sqlx::query(
                r#"
                INSERT INTO user_collections
                (user_id, version_id, quantity, condition, grade, purchase_price, purchase_date, notes, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(add.version_id)
            .bind(add.quantity)
            .bind(&add.condition)
            .bind(&add.grade)
            .bind(add.purchase_price)
            .bind(add.purchase_date)
            .bind(&add.notes)
            .bind(now)
            .bind(now)
            .execute(&*self.pool)
            .await?
            .last_insert_rowid(),
        };

        self.collection_entry(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Collection entry {} vanished", id))
    }

    pub async fn collection_entry(&self, id: i64) -> Result<Option<CollectionEntry>> {
        let sql = format!("SELECT {} FROM user_collections WHERE id = ?", COLLECTION_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&*self.pool).await?;
        row.as_ref().map(collection_from_row).transpose()
    }

    pub async fn remove_from_collection(&self, user_id: i64, entry_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_collections WHERE id = ? AND user_id = ?")
            .bind(entry_id)
            .bind(user_id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn collection(&self, user_id: i64) -> Result<Vec<CollectionEntry>> {
        let sql = format!(
            "SELECT {} FROM user_collections WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            COLLECTION_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&*self.pool).await?;
        rows.iter().map(collection_from_row).collect()
    }

    // ===============================
    // WISHLISTS
    // ===============================

    /// Add a version to the wishlist, or update the existing entry for it
    pub async fn upsert_wishlist(
        &self,
        user_id: i64,
        version_id: i64,
        quantity: i64,
        max_price: Option<f64>,
        priority: WishPriority,
    ) -> Result<WishlistEntry> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO wishlists (user_id, version_id, quantity, max_price, priority, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, version_id) DO UPDATE SET
                quantity = excluded.quantity,
                max_price = excluded.max_price,
                priority = excluded.priority,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(version_id)
        .bind(quantity)
        .bind(max_price)
        .bind(priority.as_str())
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        let sql = format!("SELECT {} FROM wishlists WHERE user_id = ? AND version_id = ?", WISHLIST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(version_id)
            .fetch_one(&*self.pool)
            .await?;
        wishlist_from_row(&row)
    }

    pub async fn remove_from_wishlist(&self, user_id: i64, version_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM wishlists WHERE user_id = ? AND version_id = ?")
            .bind(user_id)
            .bind(version_id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Highest priority first
    pub async fn wishlist(&self, user_id: i64) -> Result<Vec<WishlistEntry>> {
        let sql = format!(
            "SELECT {} FROM wishlists WHERE user_id = ? \
             ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, created_at",
            WISHLIST_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&*self.pool).await?;
        rows.iter().map(wishlist_from_row).collect()
    }

    // ===============================
    // DECKS
    // ===============================

    /// Create a deck with a fresh share code not used by any other deck
    pub async fn create_deck(&self, user_id: i64, deck: &NewDeck) -> Result<Deck> {
        let share_code = loop {
            let candidate = generate_share_code();
            let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM decks WHERE share_code = ?")
                .bind(&candidate)
                .fetch_one(&*self.pool)
                .await?;
            if taken == 0 {
                break candidate;
            }
        };

        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO decks (user_id, name, description, format, is_public, share_code, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&deck.name)
        .bind(&deck.description)
        .bind(&deck.format)
        .bind(deck.is_public)
        .bind(&share_code)
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?
        .last_insert_rowid();

        self.deck_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::DeckNotFound(share_code).into())
    }

    pub async fn deck_by_id(&self, id: i64) -> Result<Option<Deck>> {
        let sql = format!("SELECT {} FROM decks WHERE id = ?", DECK_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&*self.pool).await?;
        row.as_ref().map(deck_from_row).transpose()
    }

    pub async fn deck_by_share_code(&self, share_code: &str) -> Result<Option<Deck>> {
        let sql = format!("SELECT {} FROM decks WHERE share_code = ?", DECK_COLUMNS);
        let row = sqlx::query(&sql).bind(share_code).fetch_optional(&*self.pool).await?;
        row.as_ref().map(deck_from_row).transpose()
    }

    pub async fn decks_for_user(&self, user_id: i64) -> Result<Vec<Deck>> {
        let sql = format!("SELECT {} FROM decks WHERE user_id = ? ORDER BY updated_at DESC, id DESC", DECK_COLUMNS);
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&*self.pool).await?;
        rows.iter().map(deck_from_row).collect()
    }

    pub async fn public_decks(&self, limit: i64) -> Result<Vec<Deck>> {
        let sql = format!(
            "SELECT {} FROM decks WHERE is_public = 1 ORDER BY updated_at DESC, id DESC LIMIT ?",
            DECK_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&*self.pool).await?;
        rows.iter().map(deck_from_row).collect()
    }

    /// Set how many copies of a version the deck runs; zero removes it.
    pub async fn set_deck_card(&self, deck_id: i64, version_id: i64, quantity: i64) -> Result<Option<DeckCard>> {
        if quantity <= 0 {
            sqlx::query("DELETE FROM deck_cards WHERE deck_id = ? AND version_id = ?")
                .bind(deck_id)
                .bind(version_id)
                .execute(&*self.pool)
                .await?;
            self.touch_deck(deck_id).await?;
            return Ok(None);
        }

        sqlx::query(
            "INSERT INTO deck_cards (deck_id, version_id, quantity) VALUES (?, ?, ?) \
             ON CONFLICT (deck_id, version_id) DO UPDATE SET quantity = excluded.quantity",
        )
        .bind(deck_id)
        .bind(version_id)
        .bind(quantity)
        .execute(&*self.pool)
        .await?;
        self.touch_deck(deck_id).await?;

        let row = sqlx::query("SELECT id, deck_id, version_id, quantity FROM deck_cards WHERE deck_id = ? AND version_id = ?")
            .bind(deck_id)
            .bind(version_id)
            .fetch_one(&*self.pool)
            .await?;
        Ok(Some(DeckCard {
            id: row.try_get("id")?,
            deck_id: row.try_get("deck_id")?,
            version_id: row.try_get("version_id")?,
            quantity: row.try_get("quantity")?,
        }))
    }

    pub async fn set_deck_leader(&self, deck_id: i64, version_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE decks SET leader_version_id = ?, updated_at = ? WHERE id = ?")
            .bind(version_id)
            .bind(Utc::now())
            .bind(deck_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    /// Deck cards in insertion order, with card info and the latest price
    pub async fn deck_card_details(&self, deck_id: i64) -> Result<Vec<DeckCardDetail>> {
        let rows = sqlx::query(
            r#"
            SELECT dc.version_id, dc.quantity, c.card_number, c.name, c.card_type,
                   (SELECT p.price FROM price_history p WHERE p.version_id = dc.version_id
                    ORDER BY p.recorded_at DESC, p.id DESC LIMIT 1) AS latest_price
            FROM deck_cards dc
            JOIN card_versions v ON v.id = dc.version_id
            JOIN cards c ON c.id = v.card_id
            WHERE dc.deck_id = ?
            ORDER BY dc.id
            "#,
        )
        .bind(deck_id)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DeckCardDetail {
                    version_id: row.try_get("version_id")?,
                    quantity: row.try_get("quantity")?,
                    card_number: row.try_get("card_number")?,
                    name: row.try_get("name")?,
                    card_type: row.try_get("card_type")?,
                    latest_price: row.try_get("latest_price")?,
                })
            })
            .collect()
    }

    pub async fn delete_deck(&self, deck_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM decks WHERE id = ?")
            .bind(deck_id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_deck(&self, deck_id: i64) -> Result<()> {
        sqlx::query("UPDATE decks SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(deck_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn collection_from_row(row: &SqliteRow) -> Result<CollectionEntry> {
    Ok(CollectionEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        version_id: row.try_get("version_id")?,
        quantity: row.try_get("quantity")?,
        condition: row.try_get("condition")?,
        grade: row.try_get("grade")?,
        purchase_price: row.try_get("purchase_price")?,
        purchase_date: row.try_get("purchase_date")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn wishlist_from_row(row: &SqliteRow) -> Result<WishlistEntry> {
    Ok(WishlistEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        version_id: row.try_get("version_id")?,
        quantity: row.try_get("quantity")?,
        max_price: row.try_get("max_price")?,
        priority: WishPriority::from_db(&row.try_get::<String, _>("priority")?),
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn deck_from_row(row: &SqliteRow) -> Result<Deck> {
    Ok(Deck {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        format: row.try_get("format")?,
        leader_version_id: row.try_get("leader_version_id")?,
        is_public: row.try_get("is_public")?,
        share_code: row.try_get("share_code")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
