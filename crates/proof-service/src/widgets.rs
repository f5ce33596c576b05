//! Widget write path.
//!
//! Every save validates first, so an invalid widget never reaches the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use proof_core::ids::WidgetId;
use proof_core::widget::{apply_defaults, NewWidget, Widget, WidgetUpdate};
use proof_core::ProofError;
use proof_store::WidgetStore;

use crate::error::{ServiceError, ServiceResult};

/// Create, edit, publish and delete widgets.
///
/// Writes are compare-and-set against the copy read at the start of the
/// call; a concurrent change makes the call fail with
/// [`ServiceError::WidgetConflict`] instead of being overwritten.
pub struct WidgetService<S> {
    store: Arc<S>,
}

impl<S: WidgetStore> WidgetService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn live(&self, id: &WidgetId) -> ServiceResult<Widget> {
        self.store
            .get_widget(id)
            .await?
            .filter(|w| !w.is_deleted())
            .ok_or_else(|| ServiceError::WidgetNotFound(id.to_string()))
    }

    /// Fill in defaults, validate and store a new draft widget.
    pub async fn create(&self, draft: NewWidget, now: DateTime<Utc>) -> ServiceResult<Widget> {
        let widget = apply_defaults(draft, now);
        widget.validate().map_err(ProofError::from)?;
        self.store.insert_widget(widget.clone()).await?;
        tracing::info!(widget_id = %widget.id, seller_id = %widget.seller_id, "created widget");
        Ok(widget)
    }

    /// Apply an edit. Editing a published widget's content unpublishes it.
    pub async fn update(
        &self,
        id: &WidgetId,
        update: WidgetUpdate,
        now: DateTime<Utc>,
    ) -> ServiceResult<Widget> {
        let current = self.live(id).await?;
        let next = current.apply_update(update, now);
        next.validate().map_err(ProofError::from)?;
        if next == current {
            return Ok(current);
        }

        self.replace(&current, next.clone()).await?;
        if current.published && !next.published {
            tracing::info!(widget_id = %id, "widget unpublished by edit");
        }
        Ok(next)
    }

    /// Make a valid widget eligible for rendering.
    ///
    /// Publishing an already published widget returns it unchanged.
    pub async fn publish(&self, id: &WidgetId, now: DateTime<Utc>) -> ServiceResult<Widget> {
        let current = self.live(id).await?;
        current.validate().map_err(ProofError::from)?;
        if current.published {
            return Ok(current);
        }
        let mut next = current.clone();
        next.publish(now);
        self.replace(&current, next.clone()).await?;
        tracing::info!(widget_id = %id, "published widget");
        Ok(next)
    }

    /// Take a widget off product pages without touching its content.
    pub async fn unpublish(&self, id: &WidgetId, now: DateTime<Utc>) -> ServiceResult<Widget> {
        let current = self.live(id).await?;
        if !current.published {
            return Ok(current);
        }
        let mut next = current.clone();
        next.published = false;
        next.updated_at = now;
        self.replace(&current, next.clone()).await?;
        Ok(next)
    }

    /// Copy a widget as a new unpublished draft.
    pub async fn duplicate(&self, id: &WidgetId, now: DateTime<Utc>) -> ServiceResult<Widget> {
        let copy = self.live(id).await?.duplicate(now);
        copy.validate().map_err(ProofError::from)?;
        self.store.insert_widget(copy.clone()).await?;
        tracing::info!(widget_id = %copy.id, source_id = %id, "duplicated widget");
        Ok(copy)
    }

    /// Soft delete. Counters and candidates stay for reporting.
    pub async fn delete(&self, id: &WidgetId, now: DateTime<Utc>) -> ServiceResult<()> {
        let current = self.live(id).await?;
        let mut next = current.clone();
        next.mark_deleted(now);
        self.replace(&current, next).await?;
        tracing::info!(widget_id = %id, "deleted widget");
        Ok(())
    }

    /// Hard delete, cascading to candidates and counters.
    pub async fn purge(&self, id: &WidgetId) -> ServiceResult<()> {
        if !self.store.remove_widget(id).await? {
            return Err(ServiceError::WidgetNotFound(id.to_string()));
        }
        tracing::info!(widget_id = %id, "purged widget");
        Ok(())
    }

    /// Write `next` only if the store still holds `current`.
    async fn replace(&self, current: &Widget, next: Widget) -> ServiceResult<()> {
        if self.store.update_widget(current, next).await? {
            Ok(())
        } else {
            tracing::warn!(widget_id = %current.id, "widget changed concurrently, write refused");
            Err(ServiceError::WidgetConflict(current.id.to_string()))
        }
    }
}
