//! OPCG Catalog - One Piece Card Game card catalog
//!
//! Imports series listings from the official card lists (Japanese and
//! English), reconciles them into a SQLite catalog where a card keeps one
//! identity across every series that prints it, tracks daily market prices
//! and keeps user collections, wishlists and decks.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{
    CatalogService, CollectionService, EnrichmentService, ImportOptions, ImportService, PriceService,
    VerificationService,
};
pub use domain::{CatalogError, Language};
pub use infrastructure::{AppConfig, DatabaseConnection};
