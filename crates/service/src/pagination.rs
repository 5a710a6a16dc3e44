//! Pagination utilities for service layer
//!
//! Lists are paged either by a table continuation token (`np`/`nr` are the
//! next partition and row keys) or in memory, where `np` is an offset.

use models::TableEntity;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_TOP: usize = 100;
pub const MAX_TOP: usize = 1000;

/// Pagination parameters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, IntoParams)]
pub struct Pagination {
    /// next partition key, or offset for in-memory lists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub np: Option<String>,
    /// next row key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nr: Option<String>,
    /// items per page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
}

impl Pagination {
    pub fn with_top(top: Option<usize>) -> Self { Self { top, ..Self::default() } }

    /// Clamp to 1..=1000, defaulting to 100.
    pub fn top(&self) -> usize {
        self.top.unwrap_or(DEFAULT_TOP).clamp(1, MAX_TOP)
    }

    pub fn to_continuation_token(&self) -> Option<String> {
        match (self.np.as_deref(), self.nr.as_deref()) {
            (Some(np), Some(nr)) if !np.trim().is_empty() && !nr.trim().is_empty() => Some(format!("{np} {nr}")),
            _ => None,
        }
    }

    pub fn from_continuation_token(token: Option<&str>, top: Option<usize>) -> Self {
        let Some(token) = token.filter(|t| t.len() > 1) else {
            return Self::with_top(top);
        };
        match token.split_once(' ') {
            Some((np, nr)) => Self { np: Some(np.to_string()), nr: Some(nr.to_string()), top },
            None => Self::with_top(top),
        }
    }

    fn offset(&self) -> usize {
        self.np.as_deref().and_then(|np| np.parse().ok()).unwrap_or(0)
    }
}

/// One page of results plus the parameters of the next page, if any.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub value: Vec<T>,
    pub next_page: Option<Pagination>,
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self { Self { value: Vec::new(), next_page: None } }
}

impl<T> PagedResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult { value: self.value.into_iter().map(f).collect(), next_page: self.next_page }
    }
}

/// Skip `np` items and take `top`.
pub fn paginate<T>(items: Vec<T>, pagination: &Pagination) -> PagedResult<T> {
    let total = items.len();
    let offset = pagination.offset();
    let top = pagination.top();
    let value: Vec<T> = items.into_iter().skip(offset).take(top).collect();
    let next_page = (offset + top < total).then(|| {
        let next = (offset + top).to_string();
        Pagination { np: Some(next.clone()), nr: Some(next), top: Some(top) }
    });
    PagedResult { value, next_page }
}

/// Newest first, then [`paginate`].
pub fn paginate_by_created_at<E: TableEntity>(mut items: Vec<E>, pagination: &Pagination) -> PagedResult<E> {
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    paginate(items, pagination)
}

/// Page from a segmented table query.
pub fn from_page<E>(page: models::Page<E>, top: usize) -> PagedResult<E> {
    let next_page = page
        .continuation_token
        .as_deref()
        .map(|t| Pagination::from_continuation_token(Some(t), Some(top)));
    PagedResult { value: page.values, next_page }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_is_clamped() {
        assert_eq!(Pagination::default().top(), 100);
        assert_eq!(Pagination::with_top(Some(0)).top(), 1);
        assert_eq!(Pagination::with_top(Some(5000)).top(), 1000);
    }

    #[test]
    fn continuation_token_round_trip() {
        let p = Pagination::from_continuation_token(Some("hack user1"), Some(10));
        assert_eq!(p.np.as_deref(), Some("hack"));
        assert_eq!(p.nr.as_deref(), Some("user1"));
        assert_eq!(p.to_continuation_token().as_deref(), Some("hack user1"));
    }

    #[test]
    fn malformed_tokens_keep_only_top() {
        for token in [None, Some("a"), Some("nospace")] {
            let p = Pagination::from_continuation_token(token, Some(3));
            assert_eq!(p, Pagination::with_top(Some(3)));
        }
        let blank = Pagination { np: Some(" ".into()), nr: Some("x".into()), top: None };
        assert!(blank.to_continuation_token().is_none());
    }

    #[test]
    fn in_memory_paging() {
        let items: Vec<i32> = (0..5).collect();
        let first = paginate(items.clone(), &Pagination::with_top(Some(2)));
        assert_eq!(first.value, vec![0, 1]);
        let next = first.next_page.clone().unwrap();
        assert_eq!(next.np.as_deref(), Some("2"));

        let last = paginate(items, &Pagination { np: Some("4".into()), nr: Some("4".into()), top: Some(2) });
        assert_eq!(last.value, vec![4]);
        assert!(last.next_page.is_none());
    }
}
