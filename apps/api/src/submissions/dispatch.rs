use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::warn;

use crate::lark::{redact, LarkClient, LarkMessage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeliverySummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends `message` to every webhook concurrently, one attempt each.
pub async fn notify_all(lark: &LarkClient, urls: &[String], message: LarkMessage) -> DeliverySummary {
    let message = Arc::new(message);
    let mut tasks = JoinSet::new();

    for url in urls {
        let lark = lark.clone();
        let message = Arc::clone(&message);
        let url = url.clone();
        tasks.spawn(async move {
            let result = lark.send(&url, &message).await;
            (url, result)
        });
    }

    let mut summary = DeliverySummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => summary.delivered += 1,
            Ok((url, Err(e))) => {
                warn!("Webhook {} failed: {e}", redact(&url));
                summary.failed += 1;
            }
            Err(e) => {
                warn!("Webhook task aborted: {e}");
                summary.failed += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lark::{CardBuilder, HeaderColor};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_partial_failure_is_counted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 19001, "msg": "param invalid"})))
            .expect(1)
            .mount(&server)
            .await;

        let urls = vec![format!("{}/ok", server.uri()), format!("{}/bad", server.uri())];
        let message = CardBuilder::new("t", HeaderColor::Blue).build();
        let summary = notify_all(&LarkClient::new(reqwest::Client::new()), &urls, message).await;
        assert_eq!(summary, DeliverySummary { delivered: 1, failed: 1 });
    }

    #[tokio::test]
    async fn test_no_urls_delivers_nothing() {
        let message = CardBuilder::new("t", HeaderColor::Blue).build();
        let summary = notify_all(&LarkClient::new(reqwest::Client::new()), &[], message).await;
        assert_eq!(summary, DeliverySummary::default());
    }
}
