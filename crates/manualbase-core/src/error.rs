//! Error taxonomy of the equipment store.

use thiserror::Error;

/// Errors returned by [`EquipmentStore`](crate::store::EquipmentStore)
/// operations. None of them is retried inside the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Equipment '{0}' not registered. Register it first.")]
    NotRegistered(String),

    #[error("Equipment '{0}' is already registered")]
    AlreadyExists(String),

    #[error("Equipment '{id}' maps to collection '{collection}', already owned by '{existing}'")]
    CollectionConflict {
        id: String,
        collection: String,
        existing: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Collection backend error ({context}): {source}")]
    Backend {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(#[source] anyhow::Error),

    #[error("Failed to persist equipment registry: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl StoreError {
    pub fn backend(context: impl Into<String>, source: anyhow::Error) -> Self {
        StoreError::Backend {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
