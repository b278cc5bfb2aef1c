// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound SMS delivery.

use crate::config::Config;
use crate::error::AppError;
use crate::services::verification::mask_phone;
use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Deliver `message` to `phone`. Any failure is [`AppError::SmsSendFailed`].
    async fn send(&self, phone: &str, message: &str) -> Result<(), AppError>;
}

/// JSON-over-HTTP SMS API authenticated with a bearer key.
pub struct HttpSmsGateway {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
}

impl HttpSmsGateway {
    pub fn new(
        config: &Config,
        api_url: String,
        api_key: String,
        sender: String,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("failed building SMS HTTP client")?;

        Ok(Self {
            http,
            api_url,
            api_key,
            sender,
        })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                from: &self.sender,
                to: phone,
                text: message,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(phone = %mask_phone(phone), error = %e, "SMS request failed");
                AppError::SmsSendFailed
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                phone = %mask_phone(phone),
                %status,
                body = %body,
                "SMS gateway rejected message"
            );
            return Err(AppError::SmsSendFailed);
        }

        tracing::info!(phone = %mask_phone(phone), "SMS sent");
        Ok(())
    }
}

/// Development gateway used when no SMS API is configured.
///
/// The message is only emitted at DEBUG level since it carries a live code.
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AppError> {
        tracing::info!(phone = %mask_phone(phone), "SMS delivery disabled, message not sent");
        tracing::debug!(text = %message, "Undelivered SMS");
        Ok(())
    }
}

/// Pick the HTTP gateway when fully configured, otherwise the log-only one.
pub fn gateway_from_config(config: &Config) -> anyhow::Result<Arc<dyn SmsGateway>> {
    match (
        config.sms_api_url.clone(),
        config.sms_api_key.clone(),
        config.sms_sender.clone(),
    ) {
        (Some(url), Some(key), Some(sender)) => {
            Ok(Arc::new(HttpSmsGateway::new(config, url, key, sender)?))
        }
        (None, None, None) => {
            tracing::warn!("SMS_API_URL not set, verification codes will only be logged");
            Ok(Arc::new(LogSmsGateway))
        }
        _ => anyhow::bail!("SMS_API_URL, SMS_API_KEY and SMS_SENDER must be set together"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_selection() {
        assert!(gateway_from_config(&Config::default()).is_ok());

        let partial = Config {
            sms_api_url: Some("https://sms.test/send".to_string()),
            ..Config::default()
        };
        assert!(gateway_from_config(&partial).is_err());

        let full = Config {
            sms_api_url: Some("https://sms.test/send".to_string()),
            sms_api_key: Some("key".to_string()),
            sms_sender: Some("0212345678".to_string()),
            ..Config::default()
        };
        assert!(gateway_from_config(&full).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_gateway_fails() {
        let config = Config {
            http_timeout: std::time::Duration::from_secs(1),
            ..Config::default()
        };
        let gateway = HttpSmsGateway::new(
            &config,
            "http://127.0.0.1:9/send".to_string(),
            "key".to_string(),
            "sender".to_string(),
        )
        .unwrap();

        assert!(matches!(
            gateway.send("01012345678", "code").await,
            Err(AppError::SmsSendFailed)
        ));
    }
}
