//! Client-side reconciliation of paginated list views.
//!
//! A dashboard holds one page of a sorted, paginated list and receives
//! entity snapshots over the WebSocket. [`LiveList`] folds those snapshots
//! into the held page without refetching: updates merge in place and re-sort,
//! inserts land on page 1 (or only bump the counters on deeper pages), and
//! explicit deletes shrink the totals and clamp the current page. The
//! pagination controls stay truthful even for rows the page cannot show.

pub mod list;
pub mod meta;
pub mod record;

pub use list::{descending_by, LiveList, Reconciliation};
pub use meta::PageMeta;
pub use record::LiveRecord;
