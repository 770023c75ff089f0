use serde::Serialize;

/// Default page size for pagination
pub const PAGE_SIZE: i64 = 20;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Offset-based paginated response wrapper
#[derive(Debug, Serialize)]
pub struct OffsetPaginatedResponse<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> OffsetPaginatedResponse<T> {
    pub fn new(items: Vec<T>, total_count: i64, page: i64, per_page: i64) -> Self {
        let total_pages = (total_count + per_page - 1) / per_page; // Ceiling division
        Self {
            items,
            total_count,
            page,
            per_page,
            total_pages,
        }
    }
}

/// Normalizes client-supplied page/per_page into (page, per_page, offset)
pub fn page_bounds(page: i64, per_page: i64) -> (i64, i64, i64) {
    let page = page.max(1);
    let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
    (page, per_page, (page - 1) * per_page)
}
