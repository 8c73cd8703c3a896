//! Backend payloads.
//!
//! Field names mirror the JSON the API emits (snake_case). Nullable columns
//! are `Option`; timestamps are kept as the ISO strings the server sends.

use serde::{Deserialize, Serialize};

use crate::xp::{self, XpSummary};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Qualification {
    pub qual_id: i64,
    pub qual_name: String,
    #[serde(default)]
    pub qual_type: Option<String>,
    #[serde(default)]
    pub main_field: Option<String>,
    #[serde(default)]
    pub ncs_large: Option<String>,
    #[serde(default)]
    pub managing_body: Option<String>,
    #[serde(default)]
    pub grade_code: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualificationListItem {
    #[serde(flatten)]
    pub qualification: Qualification,
    #[serde(default)]
    pub latest_pass_rate: Option<f64>,
    #[serde(default)]
    pub avg_difficulty: Option<f64>,
    #[serde(default)]
    pub total_candidates: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualificationStats {
    pub stat_id: i64,
    pub qual_id: i64,
    pub year: i32,
    pub exam_round: i32,
    #[serde(default)]
    pub candidate_cnt: Option<i64>,
    #[serde(default)]
    pub pass_cnt: Option<i64>,
    #[serde(default)]
    pub pass_rate: Option<f64>,
    #[serde(default)]
    pub exam_structure: Option<String>,
    #[serde(default)]
    pub difficulty_score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualificationDetail {
    #[serde(flatten)]
    pub qualification: Qualification,
    #[serde(default)]
    pub stats: Vec<QualificationStats>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub latest_pass_rate: Option<f64>,
    #[serde(default)]
    pub avg_difficulty: Option<f64>,
    #[serde(default)]
    pub total_candidates: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: i64,
    pub job_name: String,
    #[serde(default)]
    pub outlook: Option<String>,
    #[serde(default)]
    pub salary_info: Option<String>,
    #[serde(default)]
    pub work_conditions: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub outlook_summary: Option<String>,
    #[serde(default)]
    pub entry_salary: Option<String>,
    #[serde(default)]
    pub reward: Option<f64>,
    #[serde(default)]
    pub stability: Option<f64>,
    #[serde(default)]
    pub development: Option<f64>,
    #[serde(default)]
    pub condition: Option<f64>,
    #[serde(default)]
    pub professionalism: Option<f64>,
    #[serde(default)]
    pub equality: Option<f64>,
    #[serde(default)]
    pub similar_jobs: Option<String>,
    #[serde(default)]
    pub aptitude: Option<String>,
    #[serde(default)]
    pub employment_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifications: Option<Vec<Qualification>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total_pages: u32,
}

pub type QualificationListResponse = Paginated<QualificationListItem>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualificationStatsList {
    pub items: Vec<QualificationStats>,
    pub qual_id: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub qual_id: i64,
    pub qual_name: String,
    #[serde(default)]
    pub qual_type: Option<String>,
    #[serde(default)]
    pub main_field: Option<String>,
    #[serde(default)]
    pub managing_body: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub latest_pass_rate: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationList {
    pub items: Vec<Recommendation>,
    pub major: String,
    pub total: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub main_fields: Vec<String>,
    #[serde(default)]
    pub ncs_large: Vec<String>,
    #[serde(default)]
    pub qual_types: Vec<String>,
    #[serde(default)]
    pub managing_bodies: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub redis: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserFavorite {
    pub fav_id: i64,
    pub user_id: String,
    pub qual_id: i64,
    pub created_at: String,
    #[serde(default)]
    pub qualification: Option<Qualification>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FavoriteList {
    pub items: Vec<UserFavorite>,
    pub total: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteCheck {
    pub qual_id: i64,
    pub is_favorite: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticSearchResult {
    pub qual_id: i64,
    pub qual_name: String,
    #[serde(default)]
    pub qual_type: Option<String>,
    #[serde(default)]
    pub main_field: Option<String>,
    #[serde(default)]
    pub managing_body: Option<String>,
    pub similarity_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticSearchResponse {
    pub query: String,
    pub results: Vec<SemanticSearchResult>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HybridRecommendation {
    pub qual_id: i64,
    pub qual_name: String,
    pub semantic_similarity: f64,
    pub major_score: f64,
    #[serde(default)]
    pub reason: Option<String>,
    pub hybrid_score: f64,
    #[serde(default)]
    pub pass_rate: Option<f64>,
    #[serde(default)]
    pub rrf_score: Option<f64>,
    #[serde(default)]
    pub llm_reason: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HybridRecommendationResponse {
    pub mode: String,
    pub major: String,
    #[serde(default)]
    pub interest: Option<String>,
    pub results: Vec<HybridRecommendation>,
    #[serde(default)]
    pub guest_limited: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendingQualification {
    pub qual_id: i64,
    pub qual_name: String,
    #[serde(default)]
    pub qual_type: Option<String>,
    #[serde(default)]
    pub main_field: Option<String>,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendingList {
    pub items: Vec<TrendingQualification>,
    pub total: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Majors {
    pub majors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcquiredCert {
    pub acq_id: i64,
    pub user_id: String,
    pub qual_id: i64,
    #[serde(default)]
    pub acquired_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub qualification: Option<QualificationListItem>,
}

impl AcquiredCert {
    pub fn difficulty(&self) -> Option<f64> {
        self.qualification.as_ref().and_then(|q| q.avg_difficulty)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcquiredCertList {
    pub items: Vec<AcquiredCert>,
    pub total: u64,
    /// Server-computed summary, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp_summary: Option<XpSummary>,
}

impl AcquiredCertList {
    /// Remote summary when present, otherwise computed locally from item difficulties.
    /// `None` when there is nothing acquired.
    pub fn xp_summary(&self) -> Option<XpSummary> {
        if let Some(remote) = &self.xp_summary {
            return Some(remote.clone());
        }
        let difficulties: Vec<Option<f64>> = self.items.iter().map(AcquiredCert::difficulty).collect();
        xp::summarize(&difficulties)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_major: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdCheck {
    pub available: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn acquired(qual_id: i64, difficulty: Option<f64>) -> serde_json::Value {
        json!({
            "acq_id": qual_id * 10,
            "user_id": "u-1",
            "qual_id": qual_id,
            "acquired_at": null,
            "created_at": "2025-03-01T00:00:00Z",
            "qualification": {
                "qual_id": qual_id,
                "qual_name": format!("cert {qual_id}"),
                "qual_type": null,
                "main_field": "IT",
                "ncs_large": null,
                "managing_body": null,
                "grade_code": null,
                "is_active": true,
                "latest_pass_rate": 41.2,
                "avg_difficulty": difficulty,
                "total_candidates": 1200
            }
        })
    }

    #[test]
    fn list_item_flattens_qualification() {
        let item: QualificationListItem = serde_json::from_value(json!({
            "qual_id": 7,
            "qual_name": "Information Processing Engineer",
            "main_field": "IT",
            "is_active": true,
            "avg_difficulty": 6.4
        }))
        .unwrap();
        assert_eq!(item.qualification.qual_id, 7);
        assert_eq!(item.qualification.main_field.as_deref(), Some("IT"));
        assert_eq!(item.avg_difficulty, Some(6.4));
        assert_eq!(item.total_candidates, None);
    }

    #[test]
    fn acquired_list_computes_summary_locally() {
        let list: AcquiredCertList = serde_json::from_value(json!({
            "items": [acquired(1, Some(9.5)), acquired(2, Some(6.0)), acquired(3, None)],
            "total": 3
        }))
        .unwrap();
        let s = list.xp_summary().unwrap();
        assert_eq!(s.total_xp, 32.5);
        assert_eq!(s.level, 3);
    }

    #[test]
    fn empty_acquired_list_has_no_summary() {
        let list: AcquiredCertList =
            serde_json::from_value(json!({"items": [], "total": 0})).unwrap();
        assert!(list.xp_summary().is_none());
    }

    #[test]
    fn profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            nickname: Some("kim".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"nickname": "kim"}));
    }
}
