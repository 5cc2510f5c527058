use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A normalised page request. Construction clamps the inputs so that
/// equivalent requests always produce the same cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p.min(u32::MAX as i64) as u32,
            _ => 1,
        };
        let limit = match limit {
            Some(l) if l >= 1 => l.min(MAX_PAGE_SIZE as i64) as u32,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, limit }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_values_are_clamped() {
        let req = PageRequest::new(Some(0), Some(500));
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), MAX_PAGE_SIZE);

        let req = PageRequest::new(Some(-4), Some(0));
        assert_eq!(req, PageRequest::default());
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
        assert_eq!(PageRequest::default().offset(), 0);
    }
}
