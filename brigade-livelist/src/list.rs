use std::cmp::Ordering;
use tracing::debug;

use crate::meta::PageMeta;
use crate::record::LiveRecord;

/// What reconciling one incoming snapshot did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Matched a held row; merged in place and re-sorted.
    Updated,
    /// New row, visible on this page.
    Inserted,
    /// New row on a deeper page: only `total`/`pages` moved.
    CountedOnly,
    /// The scope predicate rejected it; nothing changed.
    OutOfScope,
}

/// Builds a descending comparator from a sort key extractor. The caller's
/// closure does any key coalescing (`updated_at.or(created_at)` and the
/// like).
pub fn descending_by<T, K, F>(key: F) -> impl Fn(&T, &T) -> Ordering
where
    K: Ord,
    F: Fn(&T) -> K,
{
    move |a, b| key(b).cmp(&key(a))
}

/// One held page of a sorted, paginated list, kept consistent with entity
/// snapshots arriving over the WebSocket.
pub struct LiveList<T: LiveRecord> {
    items: Vec<T>,
    meta: PageMeta,
    sort: Box<dyn Fn(&T, &T) -> Ordering>,
    scope: Box<dyn Fn(&T) -> bool>,
}

impl<T: LiveRecord> LiveList<T> {
    pub fn new(meta: PageMeta, sort: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        LiveList {
            items: Vec::new(),
            meta,
            sort: Box::new(sort),
            scope: Box::new(|_| true),
        }
    }

    /// Restricts which snapshots this list accepts, e.g. only reservations
    /// of one service or one status tab.
    pub fn with_scope(mut self, scope: impl Fn(&T) -> bool + 'static) -> Self {
        self.scope = Box::new(scope);
        self
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn meta(&self) -> &PageMeta {
        &self.meta
    }

    /// Wholesale replace after a fetch. Re-sorts and truncates to `limit`
    /// so the invariants hold even against a sloppy server page.
    pub fn reset(&mut self, items: Vec<T>, meta: PageMeta) {
        self.items = items;
        self.meta = meta;
        self.resort();
        self.truncate_to_limit();
    }

    /// Folds one entity snapshot into the held page.
    pub fn reconcile(&mut self, incoming: T) -> Reconciliation {
        if !(self.scope)(&incoming) {
            return Reconciliation::OutOfScope;
        }

        let incoming_id = incoming.record_id();
        let position = incoming_id.as_deref().and_then(|id| {
            self.items
                .iter()
                .position(|item| item.record_id().as_deref() == Some(id))
        });

        let outcome = match position {
            Some(index) => {
                // The merged row may move: its sort key can have changed.
                self.items[index].merge_from(&incoming);
                self.resort();
                Reconciliation::Updated
            }
            None if self.meta.page > 1 => {
                // Keep the pagination controls truthful without showing a
                // row that belongs on page 1.
                self.meta.record_added();
                Reconciliation::CountedOnly
            }
            None => {
                self.items.insert(0, incoming);
                self.resort();
                self.truncate_to_limit();
                self.meta.record_added();
                Reconciliation::Inserted
            }
        };
        debug!(?outcome, id = incoming_id.as_deref(), "reconciled snapshot");
        outcome
    }

    /// The explicit delete flow: the server confirmed the entity is gone,
    /// whichever page it sat on. Returns whether it was visible here.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items
            .retain(|item| item.record_id().as_deref() != Some(id));
        let was_visible = self.items.len() < before;
        self.meta.record_removed();
        debug!(id, was_visible, "removed record");
        was_visible
    }

    /// Derived, non-mutating view for local text/status filters. Hidden rows
    /// stay tracked in `meta`.
    pub fn visible<'a, F>(&'a self, filter: F) -> impl Iterator<Item = &'a T>
    where
        F: Fn(&T) -> bool + 'a,
    {
        self.items.iter().filter(move |item| filter(item))
    }

    fn resort(&mut self) {
        let sort = &self.sort;
        self.items.sort_by(|a, b| sort(a, b));
    }

    fn truncate_to_limit(&mut self) {
        if self.meta.limit > 0 {
            self.items.truncate(self.meta.limit as usize);
        }
    }
}
