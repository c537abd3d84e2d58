//! microCMS client. Every read of jobs, articles and taxonomy goes through here.
//!
//! Endpoints are addressed as `<base_url>/<endpoint>[/<id>]` with the API key in
//! the `X-MICROCMS-API-KEY` header.

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub mod models;
pub mod query;

use models::{Article, Job, JobCategory, ListResponse, Municipality, Prefecture, Tag};
use query::{paginate, FilterBuilder, JobSearch, ListQuery, MAX_LIMIT};

pub const JOBS: &str = "jobs";
pub const ARTICLES: &str = "articles";
pub const PREFECTURES: &str = "prefectures";
pub const MUNICIPALITIES: &str = "municipalities";
pub const TAGS: &str = "tags";
pub const JOB_CATEGORIES: &str = "job-categories";

const API_KEY_HEADER: &str = "X-MICROCMS-API-KEY";

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("CMS returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode CMS response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid CMS base URL: {0}")]
    BaseUrl(String),
}

#[derive(Debug, Deserialize)]
struct CmsErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct CmsClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl CmsClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub async fn list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &ListQuery,
    ) -> Result<ListResponse<T>, CmsError> {
        let url = self.url(&[endpoint])?;
        debug!("CMS list {endpoint} {:?}", query);

        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&query.to_params())
            .send()
            .await?;

        decode(response, endpoint).await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        id: &str,
        depth: Option<u8>,
    ) -> Result<T, CmsError> {
        let what = format!("{endpoint}/{id}");
        if !is_content_id(id) {
            return Err(CmsError::NotFound(what));
        }

        let url = self.url(&[endpoint, id])?;
        let mut request = self.http.get(url).header(API_KEY_HEADER, &self.api_key);
        if let Some(depth) = depth {
            request = request.query(&[("depth", depth.to_string())]);
        }

        decode(request.send().await?, &what).await
    }

    /// `<base_url>/<segments...>`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, CmsError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CmsError::BaseUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| CmsError::BaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Jobs ────────────────────────────────────────────────────────────────

    pub async fn list_jobs(&self, search: &JobSearch) -> Result<ListResponse<Job>, CmsError> {
        self.list(JOBS, &search.to_list_query()?).await
    }

    pub async fn get_job(&self, id: &str) -> Result<Job, CmsError> {
        self.get(JOBS, id, None).await
    }

    pub async fn featured_jobs(&self, limit: u32) -> Result<Vec<Job>, CmsError> {
        let query = ListQuery {
            limit: Some(limit.clamp(1, MAX_LIMIT)),
            filters: FilterBuilder::new().equals("featured", "true")?.build(),
            orders: Some("-publishedAt".to_string()),
            ..Default::default()
        };
        Ok(self.list::<Job>(JOBS, &query).await?.contents)
    }

    /// Jobs in the same category as `job` (or the same prefecture when the job
    /// is uncategorised), excluding `job` itself.
    pub async fn related_jobs(&self, job: &Job, limit: u32) -> Result<Vec<Job>, CmsError> {
        let filters = match (&job.job_category, &job.prefecture) {
            (Some(category), _) => FilterBuilder::new().equals("jobCategory", &category.id)?,
            (None, Some(prefecture)) => FilterBuilder::new().equals("prefecture", &prefecture.id)?,
            (None, None) => return Ok(Vec::new()),
        };
        let query = ListQuery {
            limit: Some(limit.clamp(1, MAX_LIMIT)),
            filters: filters.not_equals("id", &job.id)?.build(),
            orders: Some("-publishedAt".to_string()),
            ..Default::default()
        };
        Ok(self.list::<Job>(JOBS, &query).await?.contents)
    }

    // ── Taxonomy ────────────────────────────────────────────────────────────

    pub async fn list_prefectures(&self) -> Result<Vec<Prefecture>, CmsError> {
        let query = ListQuery {
            limit: Some(MAX_LIMIT),
            orders: Some("order".to_string()),
            ..Default::default()
        };
        let response = self.list::<Prefecture>(PREFECTURES, &query).await?;
        if response.total_count > response.limit {
            warn!(
                "prefecture list truncated: {} of {}",
                response.limit, response.total_count
            );
        }
        Ok(response.contents)
    }

    pub async fn list_municipalities(
        &self,
        prefecture_id: &str,
    ) -> Result<Vec<Municipality>, CmsError> {
        let query = ListQuery {
            limit: Some(MAX_LIMIT),
            filters: FilterBuilder::new()
                .equals("prefecture", prefecture_id)?
                .build(),
            ..Default::default()
        };
        Ok(self.list(MUNICIPALITIES, &query).await?.contents)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>, CmsError> {
        self.list_all_terms(TAGS).await
    }

    pub async fn list_job_categories(&self) -> Result<Vec<JobCategory>, CmsError> {
        self.list_all_terms(JOB_CATEGORIES).await
    }

    async fn list_all_terms(&self, endpoint: &str) -> Result<Vec<Tag>, CmsError> {
        let query = ListQuery {
            limit: Some(MAX_LIMIT),
            ..Default::default()
        };
        Ok(self.list(endpoint, &query).await?.contents)
    }

    // ── Articles ────────────────────────────────────────────────────────────

    pub async fn list_articles(
        &self,
        page: Option<u32>,
        per_page: Option<u32>,
        category: Option<&str>,
    ) -> Result<ListResponse<Article>, CmsError> {
        let (limit, offset) = paginate(page, per_page);
        let mut filters = FilterBuilder::new();
        if let Some(category) = category {
            filters = filters.equals("category", category)?;
        }
        let query = ListQuery {
            limit: Some(limit),
            offset: Some(offset),
            orders: Some("-publishedAt".to_string()),
            filters: filters.build(),
            // list views never render the body
            fields: Some("id,title,excerpt,eyecatch,category,tags,publishedAt,updatedAt".into()),
            ..Default::default()
        };
        self.list(ARTICLES, &query).await
    }

    pub async fn get_article(&self, id: &str) -> Result<Article, CmsError> {
        self.get(ARTICLES, id, None).await
    }
}

/// microCMS content ids are made of ASCII letters, digits, `-` and `_`.
fn is_content_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T, CmsError> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(CmsError::NotFound(what.to_string()));
    }

    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<CmsErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        warn!("CMS returned {status} for {what}: {message}");
        return Err(CmsError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CmsClient {
        CmsClient::new(Client::new(), server.uri(), "test-key")
    }

    fn list_body(contents: serde_json::Value) -> serde_json::Value {
        let count = contents.as_array().map(|a| a.len()).unwrap_or(0);
        json!({"contents": contents, "totalCount": count, "offset": 0, "limit": 10})
    }

    #[tokio::test]
    async fn test_list_jobs_maps_search_to_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .and(header("X-MICROCMS-API-KEY", "test-key"))
            .and(query_param("filters", "prefecture[equals]osaka"))
            .and(query_param("q", "夜勤"))
            .and(query_param("limit", "10"))
            .and(query_param("offset", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body(json!([
                {"id": "j1", "title": "配送ドライバー"}
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let search = JobSearch {
            prefecture: Some("osaka".into()),
            keyword: Some("夜勤".into()),
            page: Some(2),
            ..Default::default()
        };
        let page = client(&server).list_jobs(&search).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.contents[0].title, "配送ドライバー");
    }

    #[tokio::test]
    async fn test_get_job_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
            .mount(&server)
            .await;

        let err = client(&server).get_job("missing").await.unwrap_err();
        assert!(matches!(err, CmsError::NotFound(what) if what == "jobs/missing"));
    }

    #[tokio::test]
    async fn test_get_rejects_path_like_ids() {
        let server = MockServer::start().await;
        let err = client(&server).get_job("../articles").await.unwrap_err();
        assert!(matches!(err, CmsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_never_forwards_query_smuggled_in_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "abc", "title": "DRAFT"})))
            .expect(0)
            .mount(&server)
            .await;

        let cms = client(&server);
        for id in ["abc?draftKey=leak", "abc#x", "..", "abc def", "求人"] {
            let err = cms.get_job(id).await.unwrap_err();
            assert!(matches!(err, CmsError::NotFound(_)), "{id} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_get_joins_base_path_and_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/articles/post_01-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "post_01-a", "title": "記事"})))
            .expect(1)
            .mount(&server)
            .await;

        let cms = CmsClient::new(Client::new(), format!("{}/api/v1/", server.uri()), "k");
        let article = cms.get_article("post_01-a").await.unwrap();
        assert_eq!(article.id, "post_01-a");
    }

    #[test]
    fn test_content_id_charset() {
        assert!(is_content_id("a1-B_2"));
        assert!(!is_content_id(""));
        assert!(!is_content_id("a/b"));
        assert!(!is_content_id("a%2Fb"));
    }

    #[tokio::test]
    async fn test_error_status_carries_cms_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tags"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "X-MICROCMS-API-KEY header is invalid."})),
            )
            .mount(&server)
            .await;

        let err = client(&server).list_tags().await.unwrap_err();
        match err {
            CmsError::Status { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("invalid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_related_jobs_excludes_current() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .and(query_param(
                "filters",
                "jobCategory[equals]taxi[and]id[not_equals]j1",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body(json!([
                {"id": "j2", "title": "ハイヤー乗務員"}
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let job: Job = serde_json::from_value(json!({
            "id": "j1",
            "title": "タクシー乗務員",
            "jobCategory": {"id": "taxi", "name": "タクシー"}
        }))
        .unwrap();
        let related = client(&server).related_jobs(&job, 4).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, "j2");
    }

    #[tokio::test]
    async fn test_related_jobs_without_taxonomy_is_empty() {
        let server = MockServer::start().await;
        let job: Job = serde_json::from_value(json!({"id": "j1", "title": "t"})).unwrap();
        assert!(client(&server).related_jobs(&job, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_municipalities_filters_by_prefecture() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/municipalities"))
            .and(query_param("filters", "prefecture[equals]tokyo"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body(json!([
                {"id": "shinjuku", "name": "新宿区"},
                {"id": "shibuya", "name": "渋谷区"}
            ]))))
            .mount(&server)
            .await;

        let cities = client(&server).list_municipalities("tokyo").await.unwrap();
        assert_eq!(cities.len(), 2);
    }
}
