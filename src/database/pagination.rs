use serde::Serialize;

use super::{error::Error, form::Form};
use crate::constants::{PAGE_LIMIT_MAX, RECIPE_COUNT_PER_PAGE};

/// Page window requested through `limit` and `page` (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub page: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: RECIPE_COUNT_PER_PAGE,
            page: 1,
        }
    }
}

impl PageRequest {
    pub fn from_form(form: &Form) -> Result<Self, Error> {
        let limit = form.get_number::<i64>("limit")?.unwrap_or(RECIPE_COUNT_PER_PAGE);
        let page = form.get_number::<i64>("page")?.unwrap_or(1);

        if limit <= 0 {
            return Err(Error::validation("limit must be a positive number"));
        }
        if page <= 0 {
            return Err(Error::validation("page must be a positive number"));
        }

        let limit = limit.min(PAGE_LIMIT_MAX);
        if (page - 1).checked_mul(limit).is_none() {
            return Err(Error::validation("page is out of range"));
        }

        Ok(Self { limit, page })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn from_rows(results: Vec<T>, total_rows: i64, request: PageRequest) -> Self {
        let next = if request.page.saturating_mul(request.limit) < total_rows {
            Some(request.page + 1)
        } else {
            None
        };
        let previous = if request.page > 1 {
            Some(request.page - 1)
        } else {
            None
        };

        Self {
            count: total_rows,
            next,
            previous,
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_page_links_both_ways() {
        let request = PageRequest { limit: 2, page: 2 };
        let page = Page::from_rows(vec![3, 4], 5, request);

        assert_eq!(request.offset(), 2);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));
        assert_eq!(page.count, 5);
    }

    #[test]
    fn last_page_has_no_next() {
        let page = Page::from_rows(vec![5], 5, PageRequest { limit: 2, page: 3 });

        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(2));
    }

    #[test]
    fn huge_page_is_a_validation_error() {
        let form = Form::from_data(vec![("page".to_string(), i64::MAX.to_string())]);

        assert!(matches!(
            PageRequest::from_form(&form),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn limit_is_clamped() {
        let form = Form::from_data(vec![
            ("limit".to_string(), i64::MAX.to_string()),
            ("page".to_string(), "3".to_string()),
        ]);

        let request = PageRequest::from_form(&form).unwrap();

        assert_eq!(request.limit, PAGE_LIMIT_MAX);
        assert_eq!(request.offset(), 2 * PAGE_LIMIT_MAX);
    }

    #[test]
    fn next_link_survives_extreme_windows() {
        let request = PageRequest {
            limit: i64::MAX,
            page: 2,
        };

        assert_eq!(Page::from_rows(Vec::<i32>::new(), 10, request).next, None);
    }

    #[test]
    fn non_positive_limit_is_rejected() {
        let form = Form::from_data(vec![("limit".to_string(), "0".to_string())]);

        assert!(matches!(
            PageRequest::from_form(&form),
            Err(Error::Validation(_))
        ));
    }
}
