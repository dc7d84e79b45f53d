//! Identifier cursor enumeration.
//!
//! Pages through every non-deleted id of a document type in cursor order.
//! Pagination is keyset based (`cursor > last seen`), never offset based, so
//! concurrent inserts and updates elsewhere in the keyspace do not shift pages.
//! Records whose cursor is behind the consumed frontier when they change are
//! missed by a pass; the `since`-scoped catch-up pass picks them up, through
//! [`IdCursorEnumerator::enumerate_changes`] so records soft-deleted meanwhile
//! are seen too.

use std::sync::Arc;

use bsd_index_repository::RecordStore;
use bsd_index_shared::{Cursor, DocumentType, RecordId};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::PipelineError;

/// Default number of ids fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 100_000;

/// Creates id page sequences over a record store.
#[derive(Clone)]
pub struct IdCursorEnumerator {
    store: Arc<dyn RecordStore>,
    page_size: usize,
}

impl IdCursorEnumerator {
    pub fn new(store: Arc<dyn RecordStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Start a new enumeration of `document_type`, optionally limited to
    /// records updated at or after `since`.
    pub fn enumerate(
        &self,
        document_type: DocumentType,
        since: Option<DateTime<Utc>>,
    ) -> IdPages {
        self.pages(document_type, since, false)
    }

    /// Enumerate every id of `document_type` changed at or after `since`,
    /// soft-deleted records included.
    pub fn enumerate_changes(&self, document_type: DocumentType, since: DateTime<Utc>) -> IdPages {
        self.pages(document_type, Some(since), true)
    }

    fn pages(
        &self,
        document_type: DocumentType,
        since: Option<DateTime<Utc>>,
        include_deleted: bool,
    ) -> IdPages {
        IdPages {
            store: Arc::clone(&self.store),
            document_type,
            since,
            include_deleted,
            page_size: self.page_size,
            after: None,
            exhausted: false,
        }
    }
}

/// A finite, pull-based sequence of id pages.
///
/// Restartable by calling [`IdCursorEnumerator::enumerate`] again; resuming
/// requires remembering [`IdPages::last_cursor`].
pub struct IdPages {
    store: Arc<dyn RecordStore>,
    document_type: DocumentType,
    since: Option<DateTime<Utc>>,
    include_deleted: bool,
    page_size: usize,
    after: Option<Cursor>,
    exhausted: bool,
}

impl IdPages {
    /// Fetch the next page, or `None` once an empty page has been returned.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RecordId>>, PipelineError> {
        if self.exhausted {
            return Ok(None);
        }

        let rows = self
            .store
            .fetch_id_page(
                self.document_type,
                self.after,
                self.since,
                self.include_deleted,
                self.page_size,
            )
            .await?;

        let Some(last) = rows.last() else {
            self.exhausted = true;
            return Ok(None);
        };
        self.after = Some(last.cursor);

        debug!(
            document_type = %self.document_type,
            count = rows.len(),
            after = ?self.after,
            "Fetched id page"
        );

        Ok(Some(rows.into_iter().map(|row| row.id).collect()))
    }

    /// Cursor of the last row returned so far.
    pub fn last_cursor(&self) -> Option<Cursor> {
        self.after
    }

    /// Drain every remaining page into one list.
    pub async fn collect_all(mut self) -> Result<Vec<RecordId>, PipelineError> {
        let mut ids = Vec::new();
        while let Some(page) = self.next_page().await? {
            ids.extend(page);
        }
        Ok(ids)
    }
}
