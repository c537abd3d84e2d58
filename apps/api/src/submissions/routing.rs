//! Chooses which Lark webhooks an application is sent to.

use crate::config::WebhookRoute;

#[derive(Debug, Clone, Copy)]
pub struct WebhookRouter<'a> {
    routes: &'a [WebhookRoute],
    fallback: Option<&'a str>,
    cc: &'a [String],
}

impl<'a> WebhookRouter<'a> {
    pub fn new(routes: &'a [WebhookRoute], fallback: Option<&'a str>, cc: &'a [String]) -> Self {
        Self {
            routes,
            fallback,
            cc,
        }
    }

    /// The routed (or fallback) webhook followed by CC webhooks, without
    /// duplicates. Empty when nothing is configured.
    pub fn select(&self, company: Option<&str>, job_title: Option<&str>) -> Vec<String> {
        let primary = [company, job_title]
            .into_iter()
            .flatten()
            .find_map(|haystack| self.match_route(haystack))
            .or(self.fallback);

        let mut urls: Vec<String> = Vec::new();
        for url in primary.into_iter().chain(self.cc.iter().map(String::as_str)) {
            if !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
        }
        urls
    }

    fn match_route(&self, haystack: &str) -> Option<&'a str> {
        let haystack = fold(haystack);
        if haystack.is_empty() {
            return None;
        }
        self.routes
            .iter()
            .find(|route| {
                let needle = fold(&route.pattern);
                !needle.is_empty() && haystack.contains(&needle)
            })
            .map(|route| route.url.as_str())
    }
}

/// Lowercase with all whitespace (including full-width spaces) removed.
fn fold(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
