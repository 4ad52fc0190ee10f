//! Inventory API interaction module
//!
//! This module resolves enrichment tags for an asset identifier from the
//! remote inventory API. Tags are optional enrichment, not a hard
//! dependency: every failure path degrades to an empty tag set instead of
//! failing the run.
//!
//! # Module Structure
//!
//! - [`http`] - HTTP utilities for the inventory REST API
//! - [`tags`] - Tag lookup with bounded retries and backoff
//!
//! # Example
//!
//! ```ignore
//! use crate::inventory::InventoryClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = InventoryClient::new("https://inventory.example.com/api/projects", 3)?;
//!     let tags = client.fetch_tags("asset-1234").await;
//!     Ok(())
//! }
//! ```

pub mod http;
pub mod tags;

pub use tags::{InventoryClient, TagSet, DEFAULT_MAX_ATTEMPTS};
