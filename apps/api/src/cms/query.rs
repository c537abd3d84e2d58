//! Query parameters for microCMS list endpoints and the job-search mapping.

use serde::Deserialize;

use super::CmsError;

pub const MAX_LIMIT: u32 = 100;
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Parameters accepted by microCMS list endpoints. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub orders: Option<String>,
    pub q: Option<String>,
    pub filters: Option<String>,
    pub fields: Option<String>,
    pub ids: Option<String>,
    pub depth: Option<u8>,
}

impl ListQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("limit", limit.min(MAX_LIMIT).to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        let strings = [
            ("orders", &self.orders),
            ("q", &self.q),
            ("filters", &self.filters),
            ("fields", &self.fields),
            ("ids", &self.ids),
        ];
        for (name, value) in strings {
            if let Some(value) = value {
                params.push((name, value.clone()));
            }
        }
        if let Some(depth) = self.depth {
            params.push(("depth", depth.to_string()));
        }
        params
    }
}

/// Concatenates microCMS filter conditions with `[and]`.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    conditions: Vec<String>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(self, field: &str, value: &str) -> Result<Self, CmsError> {
        self.push(field, "equals", value)
    }

    pub fn not_equals(self, field: &str, value: &str) -> Result<Self, CmsError> {
        self.push(field, "not_equals", value)
    }

    pub fn contains(self, field: &str, value: &str) -> Result<Self, CmsError> {
        self.push(field, "contains", value)
    }

    pub fn greater_than(self, field: &str, value: i64) -> Result<Self, CmsError> {
        self.push(field, "greater_than", &value.to_string())
    }

    fn push(mut self, field: &str, op: &str, value: &str) -> Result<Self, CmsError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(self);
        }
        // the filter grammar has no escaping, so reserved characters can't be sent
        if value.contains(['[', ']', ',']) {
            return Err(CmsError::InvalidFilter(format!(
                "{field} contains reserved characters: '{value}'"
            )));
        }
        self.conditions.push(format!("{field}[{op}]{value}"));
        Ok(self)
    }

    pub fn build(self) -> Option<String> {
        (!self.conditions.is_empty()).then(|| self.conditions.join("[and]"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOrder {
    #[default]
    Newest,
    Salary,
    Updated,
}

impl JobOrder {
    pub fn as_orders(self) -> &'static str {
        match self {
            JobOrder::Newest => "-publishedAt",
            JobOrder::Salary => "-salaryMax",
            JobOrder::Updated => "-updatedAt",
        }
    }
}

/// Job search form, as sent by the listing page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSearch {
    pub keyword: Option<String>,
    pub prefecture: Option<String>,
    pub municipality: Option<String>,
    pub category: Option<String>,
    /// Comma-separated tag ids; every tag must match.
    pub tags: Option<String>,
    pub salary_min: Option<u32>,
    pub employment_type: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub order: JobOrder,
}

impl JobSearch {
    pub fn tag_ids(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_list_query(&self) -> Result<ListQuery, CmsError> {
        let mut filters = FilterBuilder::new();
        if let Some(id) = &self.prefecture {
            filters = filters.equals("prefecture", id)?;
        }
        if let Some(id) = &self.municipality {
            filters = filters.equals("municipality", id)?;
        }
        if let Some(id) = &self.category {
            filters = filters.equals("jobCategory", id)?;
        }
        for tag in self.tag_ids() {
            filters = filters.contains("tags", tag)?;
        }
        if let Some(min) = self.salary_min.filter(|m| *m > 0) {
            // greater_than is strict
            filters = filters.greater_than("salaryMax", i64::from(min) - 1)?;
        }
        if let Some(kind) = &self.employment_type {
            filters = filters.contains("employmentType", kind)?;
        }

        let (limit, offset) = paginate(self.page, self.per_page);

        Ok(ListQuery {
            limit: Some(limit),
            offset: Some(offset),
            orders: Some(self.order.as_orders().to_string()),
            q: self
                .keyword
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from),
            filters: filters.build(),
            ..Default::default()
        })
    }
}

/// 1-based page number and page size to microCMS `(limit, offset)`.
pub fn paginate(page: Option<u32>, per_page: Option<u32>) -> (u32, u32) {
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_LIMIT);
    let page = page.unwrap_or(1).max(1);
    (per_page, (page - 1).saturating_mul(per_page))
}
