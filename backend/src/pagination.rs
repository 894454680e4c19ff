use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// `?page=&limit=` query parameters shared by every list endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// One-based page number, never below 1.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    pub fn into_page<T>(self, items: Vec<T>, total: i64) -> Paginated<T> {
        Paginated::new(items, self, total)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, params: PageParams, total: i64) -> Self {
        let limit = params.limit();
        let total = total.max(0);
        Self {
            items,
            page: params.page(),
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, 1, DEFAULT_LIMIT, 0)]
    #[case(Some(3), Some(20), 3, 20, 40)]
    #[case(Some(0), Some(5), 1, 5, 0)]
    #[case(Some(-4), Some(500), 1, MAX_LIMIT, 0)]
    #[case(Some(2), Some(0), 2, 1, 1)]
    fn page_params_are_clamped(
        #[case] page: Option<i64>,
        #[case] limit: Option<i64>,
        #[case] expected_page: i64,
        #[case] expected_limit: i64,
        #[case] expected_offset: i64,
    ) {
        let params = PageParams { page, limit };
        assert_eq!(params.page(), expected_page);
        assert_eq!(params.limit(), expected_limit);
        assert_eq!(params.offset(), expected_offset);
    }

    #[rstest]
    #[case(0, 10, 0)]
    #[case(1, 10, 1)]
    #[case(10, 10, 1)]
    #[case(11, 10, 2)]
    #[case(95, 20, 5)]
    fn total_pages_rounds_up(#[case] total: i64, #[case] limit: i64, #[case] expected: i64) {
        let page: Paginated<()> = Paginated::new(Vec::new(), PageParams::new(1, limit), total);
        assert_eq!(page.total_pages, expected);
    }

    #[test]
    fn map_keeps_paging_metadata() {
        let page = PageParams::new(2, 2).into_page(vec![1, 2], 7).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!((page.page, page.limit, page.total, page.total_pages), (2, 2, 7, 4));
    }
}
