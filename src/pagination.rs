//! Sort and page parameters shared by list endpoints.
//!
//! List endpoints take a 1-based `page`, a `limit`, and (where the entity
//! supports it) a sort field from a fixed set plus a direction. Unknown sort
//! fields and directions are client errors. The result is a [`Page`] with
//! enough metadata to compute navigation.

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::{bad_request, AppResult};

/// Raw pagination query parameters (`?page=2&limit=20`).
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Parses `page` and `limit`, applying defaults and clamping `limit` to
    /// the configured maximum. Non-numeric or non-positive values are 400.
    pub fn parse(query: &PageQuery, cfg: &PaginationConfig) -> AppResult<Self> {
        let page = parse_positive("page", query.page.as_deref())?.unwrap_or(1);
        let limit = parse_positive("limit", query.limit.as_deref())?
            .unwrap_or(cfg.default_limit)
            .min(cfg.max_limit);
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_positive(name: &str, raw: Option<&str>) -> AppResult<Option<i64>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let value: i64 = raw
        .parse()
        .map_err(|_| bad_request(format!("{} must be a positive integer", name)))?;
    if value < 1 {
        return Err(bad_request(format!("{} must be >= 1", name)));
    }
    Ok(Some(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.unwrap_or("desc") {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(bad_request(format!(
                "invalid sortType '{}': use asc or desc",
                other
            ))),
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Sortable video fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSortField {
    Views,
    Duration,
    CreatedAt,
}

impl VideoSortField {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.unwrap_or("views") {
            "views" => Ok(Self::Views),
            "duration" => Ok(Self::Duration),
            "createdAt" => Ok(Self::CreatedAt),
            other => Err(bad_request(format!(
                "invalid sortBy '{}': use views, duration, or createdAt",
                other
            ))),
        }
    }

    /// Column expression; only ever one of these fixed strings reaches SQL.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Views => "v.views",
            Self::Duration => "v.duration",
            Self::CreatedAt => "v.created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSort {
    pub field: VideoSortField,
    pub direction: SortDirection,
}

impl VideoSort {
    pub fn parse(sort_by: Option<&str>, sort_type: Option<&str>) -> AppResult<Self> {
        Ok(Self {
            field: VideoSortField::parse(sort_by)?,
            direction: SortDirection::parse(sort_type)?,
        })
    }

    /// `ORDER BY` clause with a stable tiebreak on insertion order.
    pub fn order_by(&self) -> String {
        let dir = self.direction.sql();
        format!("{} {}, v.rowid {}", self.field.column(), dir, dir)
    }
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total_docs: i64,
    pub limit: i64,
    pub page: i64,
    pub total_pages: i64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<i64>,
    pub next_page: Option<i64>,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total_docs: i64, request: PageRequest) -> Self {
        let total_pages = total_pages(total_docs, request.limit);
        let has_prev_page = request.page > 1;
        let has_next_page = request.page < total_pages;
        Self {
            docs,
            total_docs,
            limit: request.limit,
            page: request.page,
            total_pages,
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| request.page - 1),
            next_page: has_next_page.then(|| request.page + 1),
        }
    }
}

/// `ceil(total / limit)`; zero when nothing matched.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}
