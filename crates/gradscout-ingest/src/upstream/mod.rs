//! Upstream listing, detail and directory endpoints
//!
//! The pipeline talks to the upstream through the [`ListingSource`] and
//! [`DetailSource`] traits; [`UpstreamClient`] is the HTTP implementation.

pub mod client;
pub mod endpoints;

pub use client::UpstreamClient;

use crate::error::Result;
use crate::types::{DetailRecord, Item, Subject};
use async_trait::async_trait;
use std::sync::Arc;

/// Paginated listing of items per subject
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Items on one page; an empty vector means the listing is exhausted
    async fn fetch_page(&self, subject: &Subject, page: u32, page_size: u32) -> Result<Vec<Item>>;
}

/// Per-key detail records
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_detail(&self, key: &str) -> Result<DetailRecord>;
}

#[async_trait]
impl<T: ListingSource + ?Sized> ListingSource for Arc<T> {
    async fn fetch_page(&self, subject: &Subject, page: u32, page_size: u32) -> Result<Vec<Item>> {
        (**self).fetch_page(subject, page, page_size).await
    }
}

#[async_trait]
impl<T: DetailSource + ?Sized> DetailSource for Arc<T> {
    async fn fetch_detail(&self, key: &str) -> Result<DetailRecord> {
        (**self).fetch_detail(key).await
    }
}
