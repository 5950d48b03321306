//! Page-based slicing of listings

use serde::{Deserialize, Serialize};

/// Requested page, 1-based
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    /// Clamp to sane values given a default and a maximum page size
    pub fn resolve(&self, default_per_page: usize, max_per_page: usize) -> (usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(default_per_page)
            .clamp(1, max_per_page.max(1));
        (page, per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: usize,
    pub per_page: usize,
    pub total: usize,
    pub last_page: usize,
}

impl<T> Page<T> {
    /// Cut one page out of an already ordered list
    pub fn slice(items: Vec<T>, page: usize, per_page: usize) -> Self {
        let total = items.len();
        let last_page = total.div_ceil(per_page).max(1);
        let data = items
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Self {
            data,
            current_page: page,
            per_page,
            total,
            last_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_pages() {
        let page = Page::slice((1..=7).collect::<Vec<_>>(), 2, 3);
        assert_eq!(page.data, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.current_page, 2);

        let past_end = Page::slice((1..=7).collect::<Vec<_>>(), 9, 3);
        assert!(past_end.data.is_empty());
    }

    #[test]
    fn empty_list_has_one_page() {
        let page = Page::<u8>::slice(Vec::new(), 1, 15);
        assert_eq!(page.last_page, 1);
        assert_eq!(page.total, 0);
    }

    #[test]
    fn request_is_clamped() {
        assert_eq!(PageRequest::default().resolve(15, 100), (1, 15));
        assert_eq!(PageRequest::new(0, 500).resolve(15, 100), (1, 100));
        assert_eq!(PageRequest::new(3, 0).resolve(15, 100), (3, 1));
    }
}
