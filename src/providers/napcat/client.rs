use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::{HeraldError, Result, Service};
use crate::release::{AlertSink, Publisher};

use super::types::{ActionResponse, SendPrivateMessageRequest, SetLongNickRequest};

/// Client for the NapCat (OneBot 11) HTTP API.
///
/// Publishes release notes as the bot's profile signature and delivers
/// operator alerts as private messages.
pub struct NapCatClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
}

impl NapCatClient {
    pub fn new(api_base: &str, token: Option<Token>, timeout: Duration) -> Result<Self> {
        if api_base.trim().is_empty() {
            return Err(HeraldError::Config("NAPCAT_API_BASE is not set".to_string()));
        }

        let client = Client::builder()
            .user_agent("release-herald/0.3")
            .timeout(timeout)
            .build()
            .map_err(|e| HeraldError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut api_url = Url::parse(api_base.trim())
            .map_err(|e| HeraldError::Config(format!("Invalid NapCat API base URL: {e}")))?;

        // Url::join replaces the last segment unless the base ends with '/'
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    async fn call_action<B: Serialize + Sync>(&self, action: &str, body: &B) -> Result<()> {
        let url = self
            .api_url
            .join(action)
            .map_err(|e| HeraldError::Config(format!("Invalid NapCat action URL: {e}")))?;
        debug!("Calling NapCat action {action}");

        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(HeraldError::Auth {
                service: Service::NapCat,
                operation: action.to_string(),
                status: status.as_u16(),
                message: text,
            });
        }

        if !status.is_success() {
            return Err(HeraldError::Delivery(format!(
                "{action} returned status {}: {text}",
                status.as_u16()
            )));
        }

        let envelope: ActionResponse = serde_json::from_str(&text).unwrap_or_default();
        if !envelope.is_ok() {
            return Err(HeraldError::Delivery(format!(
                "{action} failed: {}",
                envelope.reason()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Publisher for NapCatClient {
    async fn publish(&self, text: &str) -> Result<()> {
        self.call_action("set_self_longnick", &SetLongNickRequest { long_nick: text })
            .await?;
        info!("Successfully published release note");
        Ok(())
    }
}

#[async_trait]
impl AlertSink for NapCatClient {
    async fn send_private_message(&self, user_id: u64, message: &str) -> Result<()> {
        self.call_action(
            "send_private_msg",
            &SendPrivateMessageRequest { user_id, message },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::Server, token: Option<Token>) -> NapCatClient {
        NapCatClient::new(&server.url(), token, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_requires_api_base() {
        let result = NapCatClient::new("", None, Duration::from_secs(5));
        assert!(matches!(result, Err(HeraldError::Config(_))));
    }

    #[tokio::test]
    async fn test_publish_sets_long_nick() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/set_self_longnick")
            .match_body(Matcher::Json(json!({ "longNick": "🚀 Deployed v1" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok","retcode":0,"data":null}"#)
            .create_async()
            .await;

        client(&server, None).publish("🚀 Deployed v1").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_base_with_path_prefix() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/napcat/set_self_longnick")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = NapCatClient::new(
            &format!("{}/napcat", server.url()),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        client.publish("note").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_publish_http_error_is_delivery_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/set_self_longnick")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client(&server, None).publish("note").await.unwrap_err();
        assert!(matches!(err, HeraldError::Delivery(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_failed_envelope_is_delivery_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/set_self_longnick")
            .with_status(200)
            .with_body(r#"{"status":"failed","retcode":1400,"wording":"bot not logged in"}"#)
            .create_async()
            .await;

        let err = client(&server, None).publish("note").await.unwrap_err();
        assert!(matches!(err, HeraldError::Delivery(ref msg) if msg.contains("bot not logged in")));
    }

    #[tokio::test]
    async fn test_rejected_access_token_is_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/set_self_longnick")
            .match_header("authorization", "Bearer napcat-secret")
            .with_status(403)
            .with_body("token verify failed")
            .create_async()
            .await;

        let err = client(&server, Some(Token::from("napcat-secret")))
            .publish("note")
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(
            err,
            HeraldError::Auth {
                service: Service::NapCat,
                status: 403,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_send_private_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send_private_msg")
            .match_body(Matcher::Json(json!({
                "user_id": 1669790626u64,
                "message": "[release-note] alert"
            })))
            .with_status(200)
            .with_body(r#"{"status":"ok","retcode":0,"data":{"message_id":1}}"#)
            .create_async()
            .await;

        client(&server, None)
            .send_private_message(1669790626, "[release-note] alert")
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
