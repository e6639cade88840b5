//! Users, collections, wishlists and decks

use anyhow::Result;

use crate::domain::collection::{CollectionAdd, CollectionEntry, WishPriority, WishlistEntry};
use crate::domain::deck::{Deck, DeckCard, DeckSummary, NewDeck};
use crate::domain::errors::CatalogError;
use crate::domain::user::{NewUser, User};
use crate::infrastructure::user_repository::UserRepository;

pub struct CollectionService {
    users: UserRepository,
}

impl CollectionService {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        self.users.create_user(user).await
    }

    pub async fn user(&self, username: &str) -> Result<User> {
        self.users
            .user_by_username(username)
            .await?
            .ok_or_else(|| CatalogError::UserNotFound(username.to_string()).into())
    }

    // collection

    /// Adding a version already held in the same condition and grade bumps
    /// its quantity.
    pub async fn add_to_collection(&self, user_id: i64, add: &CollectionAdd) -> Result<CollectionEntry> {
        ensure_quantity(add.quantity)?;
        self.ensure_version(add.version_id).await?;
        self.users.add_to_collection(user_id, add).await
    }

    pub async fn remove_from_collection(&self, user_id: i64, entry_id: i64) -> Result<bool> {
        self.users.remove_from_collection(user_id, entry_id).await
    }

    pub async fn collection(&self, user_id: i64) -> Result<Vec<CollectionEntry>> {
        self.users.collection(user_id).await
    }

    // wishlist

    pub async fn wish(
        &self,
        user_id: i64,
        version_id: i64,
        quantity: i64,
        max_price: Option<f64>,
        priority: WishPriority,
    ) -> Result<WishlistEntry> {
        ensure_quantity(quantity)?;
        self.ensure_version(version_id).await?;
        self.users
            .upsert_wishlist(user_id, version_id, quantity, max_price, priority)
            .await
    }

    pub async fn unwish(&self, user_id: i64, version_id: i64) -> Result<bool> {
        self.users.remove_from_wishlist(user_id, version_id).await
    }

    pub async fn wishlist(&self, user_id: i64) -> Result<Vec<WishlistEntry>> {
        self.users.wishlist(user_id).await
    }

    // decks

    pub async fn create_deck(&self, user_id: i64, deck: &NewDeck) -> Result<Deck> {
        if self.users.user_by_id(user_id).await?.is_none() {
            return Err(CatalogError::UserNotFound(user_id.to_string()).into());
        }
        self.users.create_deck(user_id, deck).await
    }

    /// Set the copies of a version in a deck; `0` removes it
    pub async fn set_deck_card(&self, deck_id: i64, version_id: i64, quantity: i64) -> Result<Option<DeckCard>> {
        if quantity < 0 {
            return Err(CatalogError::InvalidQuantity(quantity).into());
        }
        self.deck(deck_id).await?;
        if quantity > 0 {
            self.ensure_version(version_id).await?;
        }
        self.users.set_deck_card(deck_id, version_id, quantity).await
    }

    pub async fn remove_deck_card(&self, deck_id: i64, version_id: i64) -> Result<()> {
        self.set_deck_card(deck_id, version_id, 0).await.map(|_| ())
    }

    pub async fn set_deck_leader(&self, deck_id: i64, version_id: Option<i64>) -> Result<()> {
        self.deck(deck_id).await?;
        if let Some(id) = version_id {
            self.ensure_version(id).await?;
        }
        self.users.set_deck_leader(deck_id, version_id).await
    }

    pub async fn deck_by_share_code(&self, share_code: &str) -> Result<Deck> {
        self.users
            .deck_by_share_code(share_code)
            .await?
            .ok_or_else(|| CatalogError::DeckNotFound(share_code.to_string()).into())
    }

    pub async fn decks_for_user(&self, user_id: i64) -> Result<Vec<Deck>> {
        self.users.decks_for_user(user_id).await
    }

    pub async fn public_decks(&self, limit: i64) -> Result<Vec<Deck>> {
        self.users.public_decks(limit).await
    }

    /// Deck with its cards, latest prices included
    pub async fn deck_summary(&self, deck_id: i64) -> Result<DeckSummary> {
        let deck = self.deck(deck_id).await?;
        let cards = self.users.deck_card_details(deck_id).await?;
        Ok(DeckSummary { deck, cards })
    }

    pub async fn delete_deck(&self, deck_id: i64) -> Result<bool> {
        self.users.delete_deck(deck_id).await
    }

    async fn deck(&self, deck_id: i64) -> Result<Deck> {
        self.users
            .deck_by_id(deck_id)
            .await?
            .ok_or_else(|| CatalogError::DeckNotFound(deck_id.to_string()).into())
    }

    async fn ensure_version(&self, version_id: i64) -> Result<()> {
        if self.users.version_exists(version_id).await? {
            Ok(())
        } else {
            Err(CatalogError::VersionNotFound(version_id).into())
        }
    }
}

fn ensure_quantity(quantity: i64) -> Result<(), CatalogError> {
    if quantity < 1 {
        Err(CatalogError::InvalidQuantity(quantity))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, true)]
    #[case(4, true)]
    #[case(0, false)]
    #[case(-2, false)]
    fn quantity_must_be_positive(#[case] quantity: i64, #[case] ok: bool) {
        assert_eq!(ensure_quantity(quantity).is_ok(), ok);
    }
}
