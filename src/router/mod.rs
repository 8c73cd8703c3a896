//! Path-based router for the certification browser
//!
//! Maps a browser location (`path` + `query`) onto a typed [`RouteState`] and back.
//! Parsing is total: every input yields a route, unknown paths fall back to
//! [`RouteState::Home`] (soft 404).
//!
//! ## Route Table
//!
//! Evaluated first-match-wins, in this order:
//!
//! - `/` or empty - home
//! - `/privacy`, `/terms` - literal pages
//! - `/certs/<qualId>` - certificate detail
//! - `/certs?<filters>` - certificate list, every query key kept as a filter
//! - `/recommendations` (or `/recommendation`) - major-based recommendations
//! - `/ai-recommendations` - AI recommendations
//! - `/jobs/<jobId>` - job detail
//! - `/jobs` - job list
//! - `/mypage` - profile page
//!
//! ## Example
//!
//! ```rust
//! use certweb::router::{parse, RouteState};
//!
//! let route = parse("/certs/42", "");
//! assert_eq!(route, RouteState::CertDetail { qual_id: "42".into() });
//! assert_eq!(route.to_path(), "/certs/42");
//! ```

pub mod binding;
pub mod link;
pub mod store;

pub use binding::{AppShell, RouterBinding, Viewport};
pub use link::{ClickEvent, ClickOutcome, Link, MouseButton};
pub use store::{HistoryAdapter, MemoryHistory, RouterStore, Subscription};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter name carried by [`RouteKind::CertDetail`].
pub const QUAL_ID: &str = "qualId";
/// Parameter name carried by [`RouteKind::JobDetail`].
pub const JOB_ID: &str = "jobId";

/// Untyped parameter bag, the serialized view of a route's fields.
pub type Params = BTreeMap<String, String>;

/// Closed set of route tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteKind {
    Home,
    Certs,
    CertDetail,
    Recommendations,
    AiRecommendations,
    Jobs,
    JobDetail,
    #[serde(rename = "mypage")]
    MyPage,
    Privacy,
    Terms,
}

impl RouteKind {
    pub const ALL: [RouteKind; 10] = [
        RouteKind::Home,
        RouteKind::Certs,
        RouteKind::CertDetail,
        RouteKind::Recommendations,
        RouteKind::AiRecommendations,
        RouteKind::Jobs,
        RouteKind::JobDetail,
        RouteKind::MyPage,
        RouteKind::Privacy,
        RouteKind::Terms,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Home => "home",
            RouteKind::Certs => "certs",
            RouteKind::CertDetail => "cert-detail",
            RouteKind::Recommendations => "recommendations",
            RouteKind::AiRecommendations => "ai-recommendations",
            RouteKind::Jobs => "jobs",
            RouteKind::JobDetail => "job-detail",
            RouteKind::MyPage => "mypage",
            RouteKind::Privacy => "privacy",
            RouteKind::Terms => "terms",
        }
    }
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the app currently is. Each variant carries only the fields it needs.
///
/// Values are never mutated in place; navigation replaces the whole value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "kebab-case")]
pub enum RouteState {
    #[default]
    Home,
    /// Certificate list; `filters` holds the raw query-string pairs.
    Certs {
        #[serde(default)]
        filters: BTreeMap<String, String>,
    },
    CertDetail {
        #[serde(rename = "qualId")]
        qual_id: String,
    },
    Recommendations,
    AiRecommendations,
    Jobs,
    JobDetail {
        #[serde(rename = "jobId")]
        job_id: String,
    },
    #[serde(rename = "mypage")]
    MyPage,
    Privacy,
    Terms,
}

impl RouteState {
    pub fn kind(&self) -> RouteKind {
        match self {
            RouteState::Home => RouteKind::Home,
            RouteState::Certs { .. } => RouteKind::Certs,
            RouteState::CertDetail { .. } => RouteKind::CertDetail,
            RouteState::Recommendations => RouteKind::Recommendations,
            RouteState::AiRecommendations => RouteKind::AiRecommendations,
            RouteState::Jobs => RouteKind::Jobs,
            RouteState::JobDetail { .. } => RouteKind::JobDetail,
            RouteState::MyPage => RouteKind::MyPage,
            RouteState::Privacy => RouteKind::Privacy,
            RouteState::Terms => RouteKind::Terms,
        }
    }

    /// Flattens the route fields into the string-bag form (`qualId`, `jobId`, filter keys).
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        match self {
            RouteState::Certs { filters } => params.extend(filters.clone()),
            RouteState::CertDetail { qual_id } => {
                params.insert(QUAL_ID.to_string(), qual_id.clone());
            }
            RouteState::JobDetail { job_id } => {
                params.insert(JOB_ID.to_string(), job_id.clone());
            }
            _ => {}
        }
        params
    }

    /// Looks up a single parameter in the string-bag view.
    pub fn param(&self, name: &str) -> Option<&str> {
        match (self, name) {
            (RouteState::CertDetail { qual_id }, QUAL_ID) => Some(qual_id),
            (RouteState::JobDetail { job_id }, JOB_ID) => Some(job_id),
            (RouteState::Certs { filters }, key) => filters.get(key).map(String::as_str),
            _ => None,
        }
    }

    /// Serializes the route back into an in-app path (query included for `certs`).
    pub fn to_path(&self) -> String {
        build_path(self.kind(), &self.params())
    }
}

/// Splits an in-app href into `(path, query)`, dropping any `#fragment`.
pub fn split_href(href: &str) -> (&str, &str) {
    let href = match href.find('#') {
        Some(pos) => &href[..pos],
        None => href,
    };
    match href.split_once('?') {
        Some((path, query)) => (path, query),
        None => (href, ""),
    }
}

/// Parses an href such as `/certs?sort=name` into a route.
pub fn parse_href(href: &str) -> RouteState {
    let (path, query) = split_href(href);
    parse(path, query)
}

/// Second `/`-separated segment, or empty when absent (`/certs/42/stats` -> `42`).
fn second_segment(path: &str) -> String {
    path.split('/').nth(2).unwrap_or_default().to_string()
}

/// Decodes a query string once with form-urlencoded rules. Last value wins for repeated keys.
fn parse_query(query: &str) -> BTreeMap<String, String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Maps a location onto a route. Never fails; unmatched paths become [`RouteState::Home`].
pub fn parse(path: &str, query: &str) -> RouteState {
    match path {
        "" | "/" => RouteState::Home,
        "/privacy" => RouteState::Privacy,
        "/terms" => RouteState::Terms,
        p if p.starts_with("/certs/") => RouteState::CertDetail {
            qual_id: second_segment(p),
        },
        p if p.starts_with("/certs") => RouteState::Certs {
            filters: parse_query(query),
        },
        "/recommendations" | "/recommendation" => RouteState::Recommendations,
        "/ai-recommendations" => RouteState::AiRecommendations,
        p if p.starts_with("/jobs/") => RouteState::JobDetail {
            job_id: second_segment(p),
        },
        "/jobs" => RouteState::Jobs,
        "/mypage" => RouteState::MyPage,
        _ => RouteState::Home,
    }
}

/// Builds a path from a route tag and a loose parameter bag.
///
/// Detail routes with a missing id interpolate an empty segment (`/certs/`) rather than fail.
pub fn build_path(kind: RouteKind, params: &Params) -> String {
    let id = |name: &str| params.get(name).map(String::as_str).unwrap_or_default();
    match kind {
        RouteKind::Home => "/".to_string(),
        RouteKind::Certs => {
            if params.is_empty() {
                return "/certs".to_string();
            }
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter())
                .finish();
            format!("/certs?{query}")
        }
        RouteKind::CertDetail => format!("/certs/{}", id(QUAL_ID)),
        RouteKind::Recommendations => "/recommendations".to_string(),
        RouteKind::AiRecommendations => "/ai-recommendations".to_string(),
        RouteKind::Jobs => "/jobs".to_string(),
        RouteKind::JobDetail => format!("/jobs/{}", id(JOB_ID)),
        RouteKind::MyPage => "/mypage".to_string(),
        RouteKind::Privacy => "/privacy".to_string(),
        RouteKind::Terms => "/terms".to_string(),
    }
}
