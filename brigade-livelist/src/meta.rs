use serde::{Deserialize, Serialize};

/// Pagination state of the list a dashboard holds, as the server reported it
/// plus local adjustments from reconciled events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        PageMeta {
            page: page.max(1),
            limit,
            total,
            pages: pages_for(total, limit),
        }
    }

    pub fn record_added(&mut self) {
        self.total += 1;
        self.pages = pages_for(self.total, self.limit);
    }

    /// Also clamps `page`: deleting the last row of the last page must not
    /// leave the user on a page that no longer exists.
    pub fn record_removed(&mut self) {
        self.total = self.total.saturating_sub(1);
        self.pages = pages_for(self.total, self.limit);
        self.page = self.page.min(self.pages.max(1));
    }
}

fn pages_for(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    ((total + limit as u64 - 1) / limit as u64) as u32
}
