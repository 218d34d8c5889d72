use std::future::Future;

use laguna_scene::EntityId;
use thiserror::Error;

use crate::entity::{Entity, EntityDetails};

/// Failures reported by an [`EntitySource`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no such entity: {0}")]
    NotFound(EntityId),
}

/// Paginated supplier of entities and their detail records.
pub trait EntitySource {
    /// Fetch up to `limit` entities starting at `offset`. A page shorter than
    /// `limit` means the collection is exhausted.
    fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Entity>, SourceError>>;

    fn fetch_details(&self, id: &EntityId) -> impl Future<Output = Result<EntityDetails, SourceError>>;
}
