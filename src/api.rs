//! Typed wrappers for the certification backend.
//!
//! Each call is one [`ApiClient::request`]; authenticated endpoints take the
//! access token explicitly and attach it as a bearer header.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::form_urlencoded;

use crate::http::{ApiClient, ApiError, RequestOptions};
use crate::models::{
    AcquiredCert, AcquiredCertList, FavoriteCheck, FavoriteList, FilterOptions, HealthCheck,
    HybridRecommendationResponse, Job, Majors, ProfileUpdate, Qualification, QualificationDetail,
    QualificationListResponse, QualificationStatsList, RecommendationList,
    SemanticSearchResponse, TrendingList, UserFavorite, UserIdCheck,
};
use crate::router::Params;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    Name,
    PassRate,
    Difficulty,
    Recent,
}

impl SortOption {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOption::Name => "name",
            SortOption::PassRate => "pass_rate",
            SortOption::Difficulty => "difficulty",
            SortOption::Recent => "recent",
        }
    }
}

impl std::str::FromStr for SortOption {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortOption::Name),
            "pass_rate" => Ok(SortOption::PassRate),
            "difficulty" => Ok(SortOption::Difficulty),
            "recent" => Ok(SortOption::Recent),
            other => Err(format!("unknown sort '{other}'")),
        }
    }
}

/// Certification list query. Mirrors the `/certs` page's query string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertFilter {
    pub q: Option<String>,
    pub main_field: Option<String>,
    pub ncs_large: Option<String>,
    pub qual_type: Option<String>,
    pub managing_body: Option<String>,
    pub is_active: Option<bool>,
    pub sort: Option<SortOption>,
    pub sort_desc: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

fn non_empty(params: &Params, key: &str) -> Option<String> {
    params.get(key).filter(|v| !v.is_empty()).cloned()
}

impl CertFilter {
    /// Builds a filter from the `certs` route's query parameters.
    /// Unknown keys and unparsable values are ignored.
    pub fn from_route_filters(filters: &Params) -> Self {
        Self {
            q: non_empty(filters, "q"),
            main_field: non_empty(filters, "main_field"),
            ncs_large: non_empty(filters, "ncs_large"),
            qual_type: non_empty(filters, "qual_type"),
            managing_body: non_empty(filters, "managing_body"),
            is_active: filters.get("is_active").and_then(|v| v.parse().ok()),
            sort: filters.get("sort").and_then(|v| v.parse().ok()),
            sort_desc: filters.get("sort_desc").and_then(|v| v.parse().ok()),
            page: filters.get("page").and_then(|v| v.parse().ok()).filter(|p| *p > 0),
            page_size: filters
                .get("page_size")
                .and_then(|v| v.parse().ok())
                .filter(|p| *p > 0),
        }
    }

    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let text = [
            ("q", &self.q),
            ("main_field", &self.main_field),
            ("ncs_large", &self.ncs_large),
            ("qual_type", &self.qual_type),
            ("managing_body", &self.managing_body),
        ];
        for (key, value) in text {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                out.push((key, v.to_string()));
            }
        }
        if let Some(v) = self.is_active {
            out.push(("is_active", v.to_string()));
        }
        if let Some(v) = self.sort {
            out.push(("sort", v.as_str().to_string()));
        }
        if let Some(v) = self.sort_desc {
            out.push(("sort_desc", v.to_string()));
        }
        if let Some(v) = self.page.filter(|p| *p > 0) {
            out.push(("page", v.to_string()));
        }
        if let Some(v) = self.page_size.filter(|p| *p > 0) {
            out.push(("page_size", v.to_string()));
        }
        out
    }

    /// Form-encoded query without the leading `?` (empty when no filter is set).
    pub fn to_query(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.pairs() {
            ser.append_pair(k, &v);
        }
        ser.finish()
    }

    /// The same filter as `certs` route parameters.
    pub fn to_route_filters(&self) -> Params {
        self.pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl JobQuery {
    pub fn to_query(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            ser.append_pair("q", q);
        }
        if let Some(p) = self.page.filter(|p| *p > 0) {
            ser.append_pair("page", &p.to_string());
        }
        if let Some(p) = self.page_size.filter(|p| *p > 0) {
            ser.append_pair("page_size", &p.to_string());
        }
        ser.finish()
    }
}

fn with_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

impl ApiClient {
    // ----- certifications -----

    pub async fn list_certifications(
        &self,
        filter: &CertFilter,
    ) -> Result<QualificationListResponse, ApiError> {
        self.get(&with_query("/certs", &filter.to_query())).await
    }

    pub async fn get_certification(
        &self,
        qual_id: i64,
        token: Option<&str>,
    ) -> Result<QualificationDetail, ApiError> {
        self.request(
            &format!("/certs/{qual_id}"),
            RequestOptions::get().bearer_opt(token),
        )
        .await
    }

    pub async fn get_certification_stats(
        &self,
        qual_id: i64,
        year: Option<i32>,
    ) -> Result<QualificationStatsList, ApiError> {
        let path = match year {
            Some(y) => format!("/certs/{qual_id}/stats?year={y}"),
            None => format!("/certs/{qual_id}/stats"),
        };
        self.get(&path).await
    }

    pub async fn get_filter_options(&self) -> Result<FilterOptions, ApiError> {
        self.get("/certs/filter-options").await
    }

    pub async fn get_trending(&self, limit: u32) -> Result<TrendingList, ApiError> {
        self.get(&format!("/certs/trending/now?limit={limit}")).await
    }

    /// Certifications the signed-in user opened most recently, newest first.
    pub async fn list_recent_viewed(&self, token: &str) -> Result<Vec<Qualification>, ApiError> {
        self.request("/certs/recent/viewed", RequestOptions::get().bearer(token))
            .await
    }

    // ----- recommendations -----

    pub async fn get_recommendations(
        &self,
        major: &str,
        limit: u32,
    ) -> Result<RecommendationList, ApiError> {
        self.get(&format!(
            "/recommendations?major={}&limit={limit}",
            urlencoding::encode(major)
        ))
        .await
    }

    pub async fn get_hybrid_recommendations(
        &self,
        major: &str,
        interest: Option<&str>,
        limit: u32,
    ) -> Result<HybridRecommendationResponse, ApiError> {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        ser.append_pair("major", major);
        if let Some(i) = interest.filter(|i| !i.is_empty()) {
            ser.append_pair("interest", i);
        }
        ser.append_pair("limit", &limit.to_string());
        self.get(&with_query(
            "/recommendations/ai/hybrid-recommendation",
            &ser.finish(),
        ))
        .await
    }

    pub async fn semantic_search(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<SemanticSearchResponse, ApiError> {
        self.get(&format!(
            "/recommendations/ai/semantic-search?query={}&limit={limit}",
            urlencoding::encode(query)
        ))
        .await
    }

    pub async fn get_majors(&self) -> Result<Majors, ApiError> {
        self.get("/recommendations/majors").await
    }

    // ----- jobs -----

    pub async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, ApiError> {
        self.get(&with_query("/jobs", &query.to_query())).await
    }

    pub async fn get_job(&self, job_id: i64) -> Result<Job, ApiError> {
        self.get(&format!("/jobs/{job_id}")).await
    }

    pub async fn health(&self) -> Result<HealthCheck, ApiError> {
        self.get("/health").await
    }

    // ----- favorites (auth) -----

    pub async fn list_favorites(
        &self,
        token: &str,
        page: u32,
        page_size: u32,
    ) -> Result<FavoriteList, ApiError> {
        self.request(
            &format!("/me/favorites?page={page}&page_size={page_size}"),
            RequestOptions::get().bearer(token),
        )
        .await
    }

    /// Not idempotent; a retried POST may reach the server twice.
    pub async fn add_favorite(&self, qual_id: i64, token: &str) -> Result<UserFavorite, ApiError> {
        self.request(
            &format!("/me/favorites/{qual_id}"),
            RequestOptions::post().bearer(token),
        )
        .await
    }

    pub async fn remove_favorite(&self, qual_id: i64, token: &str) -> Result<(), ApiError> {
        self.request::<IgnoredAny>(
            &format!("/me/favorites/{qual_id}"),
            RequestOptions::delete().bearer(token),
        )
        .await
        .map(|_| ())
    }

    pub async fn check_favorite(&self, qual_id: i64, token: &str) -> Result<FavoriteCheck, ApiError> {
        self.request(
            &format!("/me/favorites/{qual_id}/check"),
            RequestOptions::get().bearer(token),
        )
        .await
    }

    // ----- acquired certifications (auth) -----

    pub async fn list_acquired_certs(&self, token: &str) -> Result<AcquiredCertList, ApiError> {
        self.request("/me/acquired-certs", RequestOptions::get().bearer(token))
            .await
    }

    pub async fn add_acquired_cert(&self, qual_id: i64, token: &str) -> Result<AcquiredCert, ApiError> {
        self.request(
            &format!("/me/acquired-certs/{qual_id}"),
            RequestOptions::post().bearer(token),
        )
        .await
    }

    pub async fn remove_acquired_cert(&self, qual_id: i64, token: &str) -> Result<(), ApiError> {
        self.request::<IgnoredAny>(
            &format!("/me/acquired-certs/{qual_id}"),
            RequestOptions::delete().bearer(token),
        )
        .await
        .map(|_| ())
    }

    // ----- profile -----

    pub async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<serde_json::Value, ApiError> {
        let body = serde_json::to_value(update).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.request(
            "/auth/profile",
            RequestOptions::patch().bearer(token).json(&body),
        )
        .await
    }

    pub async fn check_userid(&self, userid: &str) -> Result<UserIdCheck, ApiError> {
        self.request(
            "/auth/check-userid",
            RequestOptions::post().json(&json!({ "userid": userid })),
        )
        .await
    }
}
