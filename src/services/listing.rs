use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Resolves marketplace listings to their sellers. The catalog is owned by
/// another service; this seam keeps the chat server decoupled from it.
#[async_trait]
pub trait ListingDirectory: Send + Sync + std::fmt::Debug {
    /// The seller of a listing, or `None` when the listing is unknown.
    async fn seller_of(&self, product_id: i64) -> Option<Uuid>;
}

/// A directory that knows no listings. Deployments without a catalog
/// integration reject product-initiated rooms.
#[derive(Debug, Default)]
pub struct NullListingDirectory;

#[async_trait]
impl ListingDirectory for NullListingDirectory {
    async fn seller_of(&self, _product_id: i64) -> Option<Uuid> {
        None
    }
}

/// In-memory directory, populated by hand.
#[derive(Debug, Default)]
pub struct StaticListingDirectory {
    sellers: DashMap<i64, Uuid>,
}

impl StaticListingDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, product_id: i64, seller_id: Uuid) {
        self.sellers.insert(product_id, seller_id);
    }
}

#[async_trait]
impl ListingDirectory for StaticListingDirectory {
    async fn seller_of(&self, product_id: i64) -> Option<Uuid> {
        self.sellers.get(&product_id).map(|entry| *entry.value())
    }
}
