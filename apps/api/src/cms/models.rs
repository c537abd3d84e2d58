//! microCMS content models. Field names follow the CMS schema (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope returned by every microCMS list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub contents: Vec<T>,
    pub total_count: u32,
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmsImage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Timestamps microCMS attaches to every content entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFields {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub revised_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefecture {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub region: Option<String>,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Municipality {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub prefecture: Option<Prefecture>,
}

/// Shared shape of the flat taxonomies (tags, job categories).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
}

pub type Tag = Term;
pub type JobCategory = Term;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub salary_min: Option<u32>,
    #[serde(default)]
    pub salary_max: Option<u32>,
    /// Select field in the CMS; a one-element array on the wire.
    #[serde(default, deserialize_with = "select::deserialize")]
    pub salary_type: Option<String>,
    #[serde(default)]
    pub employment_type: Vec<String>,
    #[serde(default)]
    pub working_hours: Option<String>,
    #[serde(default)]
    pub holidays: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub prefecture: Option<Prefecture>,
    #[serde(default)]
    pub municipality: Option<Municipality>,
    #[serde(default)]
    pub job_category: Option<JobCategory>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub thumbnail: Option<CmsImage>,
    #[serde(default)]
    pub images: Vec<CmsImage>,
    #[serde(default)]
    pub featured: bool,
    #[serde(flatten)]
    pub system: SystemFields,
}

impl Job {
    /// Salary range as shown on job cards, e.g. `月給 250,000円〜320,000円`.
    pub fn salary_label(&self) -> Option<String> {
        let range = match (self.salary_min, self.salary_max) {
            (Some(min), Some(max)) if min == max => format!("{}円", group_digits(min)),
            (Some(min), Some(max)) => {
                format!("{}円〜{}円", group_digits(min), group_digits(max))
            }
            (Some(min), None) => format!("{}円〜", group_digits(min)),
            (None, Some(max)) => format!("〜{}円", group_digits(max)),
            (None, None) => return None,
        };
        Some(match &self.salary_type {
            Some(kind) => format!("{kind} {range}"),
            None => range,
        })
    }

    /// Prefecture and municipality names joined for display.
    pub fn location_label(&self) -> Option<String> {
        let parts: Vec<&str> = [
            self.prefecture.as_ref().map(|p| p.name.as_str()),
            self.municipality.as_ref().map(|m| m.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub eyecatch: Option<CmsImage>,
    #[serde(default)]
    pub category: Option<Term>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(flatten)]
    pub system: SystemFields,
}

fn group_digits(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

mod select {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SelectValue {
        One(String),
        Many(Vec<String>),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(
            match Option::<SelectValue>::deserialize(deserializer)? {
                Some(SelectValue::One(s)) => Some(s),
                Some(SelectValue::Many(v)) => v.into_iter().next(),
                None => None,
            }
            .filter(|s| !s.is_empty()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_json() -> serde_json::Value {
        json!({
            "id": "job-1",
            "title": "タクシードライバー",
            "companyName": "ライド交通株式会社",
            "salaryMin": 250000,
            "salaryMax": 320000,
            "salaryType": ["月給"],
            "employmentType": ["正社員"],
            "prefecture": {"id": "tokyo", "name": "東京都", "order": 13},
            "municipality": {"id": "shinjuku", "name": "新宿区"},
            "tags": [{"id": "t1", "name": "未経験歓迎"}],
            "createdAt": "2024-04-01T00:00:00.000Z",
            "publishedAt": "2024-04-02T09:30:00.000Z"
        })
    }

    #[test]
    fn test_job_deserializes_cms_shape() {
        let job: Job = serde_json::from_value(job_json()).unwrap();
        assert_eq!(job.company_name.as_deref(), Some("ライド交通株式会社"));
        assert_eq!(job.salary_type.as_deref(), Some("月給"));
        assert_eq!(job.tags[0].name, "未経験歓迎");
        assert!(job.system.published_at.is_some());
        assert!(job.images.is_empty());
        assert!(!job.featured);
    }

    #[test]
    fn test_minimal_job_deserializes() {
        let job: Job = serde_json::from_value(json!({"id": "x", "title": "t"})).unwrap();
        assert!(job.salary_label().is_none());
        assert!(job.location_label().is_none());
    }

    #[test]
    fn test_salary_label_formats_range() {
        let job: Job = serde_json::from_value(job_json()).unwrap();
        assert_eq!(
            job.salary_label().as_deref(),
            Some("月給 250,000円〜320,000円")
        );
    }

    #[test]
    fn test_salary_label_open_ended() {
        let mut job: Job = serde_json::from_value(job_json()).unwrap();
        job.salary_max = None;
        job.salary_type = None;
        assert_eq!(job.salary_label().as_deref(), Some("250,000円〜"));
    }

    #[test]
    fn test_location_label() {
        let job: Job = serde_json::from_value(job_json()).unwrap();
        assert_eq!(job.location_label().as_deref(), Some("東京都 新宿区"));
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(1200), "1,200");
        assert_eq!(group_digits(1_234_567), "1,234,567");
    }
}
