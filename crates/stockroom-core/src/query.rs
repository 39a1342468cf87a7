//! # Query, Ordering and Pagination
//!
//! Backend-neutral description of a `Query` call. Both the in-memory and
//! the PostgreSQL store interpret these types identically:
//!
//! - Results are ordered by [`Order`], always tie-broken by record id in
//!   the same direction, so the order is total and deterministic.
//! - Pagination is either offset/limit or keyset ([`Cursor`]). Keyset
//!   pages stay stable while other writers insert concurrently.
//! - Backends fetch `limit + 1` rows and hand them to [`Page::assemble`],
//!   which trims the probe row and derives the continuation token. A page
//!   without a continuation token is the last one.

use std::cmp::Ordering;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CursorError;
use crate::identity::RecordId;
use crate::record::Record;
use crate::temporal::Timestamp;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 50;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 500;

/// Column a query is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Id,
    CreatedAt,
    UpdatedAt,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A total order over records: the sort field, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Order {
    pub field: SortField,
    pub direction: Direction,
}

impl Order {
    pub fn new(field: SortField, direction: Direction) -> Self {
        Self { field, direction }
    }

    /// Sort key of `record` under this order.
    pub fn key<E>(&self, record: &Record<E>) -> (Option<Timestamp>, RecordId) {
        let ts = match self.field {
            SortField::Id => None,
            SortField::CreatedAt => Some(record.created_at),
            SortField::UpdatedAt => Some(record.updated_at),
        };
        (ts, record.id)
    }

    /// Compare two records under this order.
    pub fn compare<E>(&self, a: &Record<E>, b: &Record<E>) -> Ordering {
        let ord = self.key(a).cmp(&self.key(b));
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }

    /// Cursor positioned just after `record`.
    pub fn cursor_after<E>(&self, record: &Record<E>) -> Cursor {
        let (sort_value, id) = self.key(record);
        Cursor {
            order: *self,
            sort_value,
            id,
        }
    }

    fn tag(&self) -> &'static str {
        match (self.field, self.direction) {
            (SortField::Id, Direction::Asc) => "ia",
            (SortField::Id, Direction::Desc) => "id",
            (SortField::CreatedAt, Direction::Asc) => "ca",
            (SortField::CreatedAt, Direction::Desc) => "cd",
            (SortField::UpdatedAt, Direction::Asc) => "ua",
            (SortField::UpdatedAt, Direction::Desc) => "ud",
        }
    }
}

/// Keyset position: the sort key of the last record a caller has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub order: Order,
    pub sort_value: Option<Timestamp>,
    pub id: RecordId,
}

impl Cursor {
    /// Whether `record` comes strictly after this cursor.
    pub fn admits<E>(&self, record: &Record<E>) -> bool {
        let key = self.order.key(record);
        let here = (self.sort_value, self.id);
        match self.order.direction {
            Direction::Asc => key > here,
            Direction::Desc => key < here,
        }
    }

    /// Opaque URL-safe encoding handed to callers.
    pub fn encode(&self) -> String {
        let ts = self
            .sort_value
            .map(|t| t.timestamp_micros().to_string())
            .unwrap_or_default();
        let raw = format!("{}:{}:{}", self.order.tag(), ts, self.id.0.simple());
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decode a cursor and check it was issued for `order`.
    pub fn decode(token: &str, order: Order) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| CursorError::Malformed)?;
        let raw = String::from_utf8(bytes).map_err(|_| CursorError::Malformed)?;
        let mut parts = raw.splitn(3, ':');
        let (tag, ts, id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(tag), Some(ts), Some(id)) => (tag, ts, id),
            _ => return Err(CursorError::Malformed),
        };
        if tag != order.tag() {
            return Err(CursorError::OrderMismatch);
        }
        let sort_value = match (order.field, ts.is_empty()) {
            (SortField::Id, true) => None,
            (SortField::Id, false) => return Err(CursorError::Malformed),
            (_, true) => return Err(CursorError::Malformed),
            (_, false) => {
                let micros: i64 = ts.parse().map_err(|_| CursorError::Malformed)?;
                Some(Timestamp::from_micros(micros).ok_or(CursorError::Malformed)?)
            }
        };
        let id = Uuid::parse_str(id).map_err(|_| CursorError::Malformed)?;
        Ok(Self {
            order,
            sort_value,
            id: RecordId(id),
        })
    }
}

/// How a query result is windowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    Offset { offset: u64, limit: u32 },
    Cursor { after: Option<Cursor>, limit: u32 },
}

impl Pagination {
    /// Requested page size.
    pub fn limit(&self) -> u32 {
        match self {
            Self::Offset { limit, .. } | Self::Cursor { limit, .. } => *limit,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::Cursor {
            after: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// A complete `Query` request.
#[derive(Debug, Clone, Default)]
pub struct Query<F> {
    pub filter: F,
    pub order: Order,
    pub pagination: Pagination,
}

impl<F> Query<F> {
    /// First page of `filter` in id order.
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            order: Order::default(),
            pagination: Pagination::default(),
        }
    }

    pub fn ordered(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn offset(mut self, offset: u64, limit: u32) -> Self {
        self.pagination = Pagination::Offset { offset, limit };
        self
    }

    pub fn after(mut self, cursor: Option<Cursor>, limit: u32) -> Self {
        self.pagination = Pagination::Cursor {
            after: cursor,
            limit,
        };
        self
    }

    /// Number of rows a backend should fetch: one more than the page size.
    pub fn fetch_limit(&self) -> usize {
        self.pagination.limit() as usize + 1
    }
}

/// One window of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token for cursor pagination; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Next offset for offset pagination; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u64>,
}

impl<E> Page<Record<E>> {
    /// Build a page from up to `query.fetch_limit()` ordered rows.
    pub fn assemble<F>(mut rows: Vec<Record<E>>, query: &Query<F>) -> Self {
        let limit = query.pagination.limit() as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let (next_cursor, next_offset) = match (has_more, query.pagination) {
            (false, _) => (None, None),
            (true, Pagination::Offset { offset, limit }) => (None, Some(offset + u64::from(limit))),
            (true, Pagination::Cursor { .. }) => (
                rows.last().map(|r| query.order.cursor_after(r).encode()),
                None,
            ),
        };

        Self {
            items: rows,
            next_cursor,
            next_offset,
        }
    }
}

impl<T> Page<T> {
    /// Transform every item, keeping the continuation tokens.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            next_offset: self.next_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::OrganizationId;
    use proptest::prelude::*;

    fn records(n: usize) -> Vec<Record<u32>> {
        let org = OrganizationId::new();
        (0..n as u32).map(|i| Record::create(org, i)).collect()
    }

    #[test]
    fn cursor_round_trips_for_every_order() {
        let r = &records(1)[0];
        for field in [SortField::Id, SortField::CreatedAt, SortField::UpdatedAt] {
            for direction in [Direction::Asc, Direction::Desc] {
                let order = Order::new(field, direction);
                let cursor = order.cursor_after(r);
                let decoded = Cursor::decode(&cursor.encode(), order).unwrap();
                assert_eq!(decoded, cursor);
            }
        }
    }

    #[test]
    fn cursor_for_other_order_is_rejected() {
        let r = &records(1)[0];
        let token = Order::default().cursor_after(r).encode();
        let err = Cursor::decode(&token, Order::new(SortField::CreatedAt, Direction::Asc));
        assert_eq!(err, Err(CursorError::OrderMismatch));
    }

    #[test]
    fn garbage_cursor_is_malformed() {
        assert_eq!(
            Cursor::decode("!!!", Order::default()),
            Err(CursorError::Malformed)
        );
        let token = URL_SAFE_NO_PAD.encode("ia::not-a-uuid");
        assert_eq!(
            Cursor::decode(&token, Order::default()),
            Err(CursorError::Malformed)
        );
    }

    #[test]
    fn admits_respects_direction() {
        let rs = records(2);
        let (lo, hi) = if rs[0].id < rs[1].id {
            (&rs[0], &rs[1])
        } else {
            (&rs[1], &rs[0])
        };
        let asc = Order::default().cursor_after(lo);
        assert!(asc.admits(hi));
        assert!(!asc.admits(lo));

        let desc = Order::new(SortField::Id, Direction::Desc).cursor_after(hi);
        assert!(desc.admits(lo));
        assert!(!desc.admits(hi));
    }

    #[test]
    fn assemble_trims_probe_row_and_sets_cursor() {
        let mut rs = records(3);
        rs.sort_by(|a, b| Order::default().compare(a, b));
        let query = Query::new(()).after(None, 2);
        let page = Page::assemble(rs.clone(), &query);
        assert_eq!(page.items.len(), 2);
        let cursor = Cursor::decode(page.next_cursor.as_deref().unwrap(), Order::default()).unwrap();
        assert_eq!(cursor.id, rs[1].id);
        assert!(page.next_offset.is_none());
    }

    #[test]
    fn assemble_last_page_has_no_continuation() {
        let rs = records(2);
        let page = Page::assemble(rs, &Query::new(()).after(None, 2));
        assert!(page.next_cursor.is_none());
        assert!(page.next_offset.is_none());
    }

    #[test]
    fn assemble_offset_mode_sets_next_offset() {
        let rs = records(3);
        let page = Page::assemble(rs, &Query::new(()).offset(10, 2));
        assert_eq!(page.next_offset, Some(12));
        assert!(page.next_cursor.is_none());
    }

    proptest! {
        #[test]
        fn order_is_total_and_tie_broken_by_id(seed in 0usize..20) {
            let rs = records(seed + 2);
            for field in [SortField::Id, SortField::CreatedAt, SortField::UpdatedAt] {
                for direction in [Direction::Asc, Direction::Desc] {
                    let order = Order::new(field, direction);
                    for a in &rs {
                        for b in &rs {
                            let ab = order.compare(a, b);
                            prop_assert_eq!(ab == Ordering::Equal, a.id == b.id);
                            prop_assert_eq!(ab, order.compare(b, a).reverse());
                        }
                    }
                }
            }
        }
    }
}
