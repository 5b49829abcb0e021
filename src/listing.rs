//! Search, filter and pagination applied to fetched rows before display.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// 1-based pagination. Page 0 reads as page 1; pages past the end clamp to
/// the last page. An empty list has a single empty page.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(total_items);
    Page {
        items: items[start..end].to_vec(),
        page,
        total_pages,
        total_items,
    }
}

/// Case-insensitive substring match against any of the haystacks.
pub fn matches_search<'a, I>(haystacks: I, term: &str) -> bool
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    haystacks
        .into_iter()
        .flatten()
        .any(|h| h.to_lowercase().contains(&needle))
}
