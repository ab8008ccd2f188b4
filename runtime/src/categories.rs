//! Category listing.

use crate::config::CursorConfig;
use recipebox_core::cursor::CursorCodec;
use recipebox_core::environment::Clock;
use recipebox_core::model::{Category, CategoryId};
use recipebox_core::pagination::{Page, PageLimits};
use recipebox_core::store::{CategoryKey, CategoryStore};
use recipebox_core::{CoreError, Result};
use std::sync::Arc;

/// Category operations.
pub struct CategoryService<S> {
    store: Arc<S>,
    codec: CursorCodec,
    limits: PageLimits,
}

impl<S> CategoryService<S>
where
    S: CategoryStore,
{
    /// Create a service with default cursor settings.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, CursorConfig::default())
    }

    /// Create a service with explicit cursor settings.
    #[must_use]
    pub fn with_config(store: Arc<S>, clock: Arc<dyn Clock>, config: CursorConfig) -> Self {
        Self {
            store,
            codec: CursorCodec::new(clock).with_future_grace(config.future_grace),
            limits: config.limits,
        }
    }

    /// Fetch an active category.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the category does not exist or is deleted.
    pub async fn get_category(&self, category_id: CategoryId) -> Result<Category> {
        match self.store.get_category(category_id).await? {
            Some(category) if category.status.is_active() => Ok(category),
            _ => Err(CoreError::not_found("category", category_id)),
        }
    }

    /// Active categories ordered by name, then identifier.
    ///
    /// The cursor is the identifier of the last category of the previous page.
    ///
    /// # Errors
    ///
    /// - `InvalidCursor` if the cursor is malformed or unknown
    /// - `Unavailable` if the store fails
    pub async fn list_categories(&self, cursor: Option<&str>, limit: i64) -> Result<Page<Category>> {
        let limit = self.limits.clamp(limit);
        let after = match self.codec.decode_id(cursor)? {
            None => None,
            Some(id) => {
                let category_id = CategoryId::from_uuid(id);
                let category = self.store.get_category(category_id).await?.ok_or_else(|| {
                    CoreError::InvalidCursor(format!("category {category_id} does not exist"))
                })?;
                Some(CategoryKey::from(&category))
            }
        };

        let rows = self
            .store
            .list_categories(after, PageLimits::fetch_size(limit))
            .await?;
        Ok(Page::from_overfetch(rows, limit, |last| {
            self.codec.encode_id(last.id.as_uuid())
        }))
    }
}
