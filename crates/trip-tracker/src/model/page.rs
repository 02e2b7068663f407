use serde::{Deserialize, Serialize};

/// One page of an ordered result set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total_docs: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_prev_page: bool,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// Slices an already ordered result set. `page` is 1-based; zero values are
    /// treated as 1.
    #[must_use]
    pub fn paginate(items: Vec<T>, page: usize, page_size: usize) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_docs = items.len();
        let total_pages = total_docs.div_ceil(page_size);

        let docs = items.into_iter().skip((page - 1).saturating_mul(page_size)).take(page_size);

        Self {
            docs: docs.collect(),
            total_docs,
            page,
            page_size,
            total_pages,
            has_prev_page: page > 1,
            has_next_page: page < total_pages,
        }
    }
}
