/// Shared types used across the codebase

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// CRUD verbs a dynamic collection endpoint can be protected on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudVerb {
    Get,
    Post,
    Put,
    Delete,
}

impl CrudVerb {
    /// Map an HTTP method onto a protectable verb. HEAD reads like GET.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET | Method::HEAD => Some(CrudVerb::Get),
            Method::POST => Some(CrudVerb::Post),
            Method::PUT | Method::PATCH => Some(CrudVerb::Put),
            Method::DELETE => Some(CrudVerb::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrudVerb::Get => "get",
            CrudVerb::Post => "post",
            CrudVerb::Put => "put",
            CrudVerb::Delete => "delete",
        }
    }
}

/// Page request shared by every listing endpoint
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Resolved, clamped page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Page {
    /// Pages past the last representable offset are pinned to it, so the
    /// window always fits a signed 64-bit `$skip`.
    pub fn resolve(query: PageQuery, default_limit: u64, max_limit: u64) -> Self {
        let limit = match query.limit {
            Some(l) if l >= 1 => (l as u64).min(max_limit),
            _ => default_limit.min(max_limit),
        }
        .max(1);
        let last_page = i64::MAX as u64 / limit + 1;
        let page = query.page.filter(|p| *p >= 1).map_or(1, |p| (p as u64).min(last_page));
        Self { page, limit }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// `skip()` as the signed offset the stores take
    pub fn offset(&self) -> i64 {
        i64::try_from(self.skip()).unwrap_or(i64::MAX)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        total.div_ceil(self.limit)
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: self.total_pages(total),
        }
    }
}

/// `pagination` block of every listing response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}
