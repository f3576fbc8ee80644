use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::config::Payload;

/// The endpoint's verdict on one delivery
#[derive(Debug, Clone, Copy)]
pub struct DeliveryResponse {
    pub ok: bool,
    pub status: u16,
}

/// HTTP seam for the send loop.
///
/// Implementations deliver one multipart POST per call: field `content` for
/// text payloads, field `file` for binary ones. Network-level failures
/// surface as errors; everything that got an HTTP response comes back as a
/// `DeliveryResponse`.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post_multipart(
        &self,
        url: &str,
        payload: &Payload,
    ) -> anyhow::Result<DeliveryResponse>;
}

/// Production transport over a shared reqwest client.
///
/// No per-request timeout is configured; a hung request never reports an
/// outcome.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("WebhookSpammer-HTTP-Client/1.0")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post_multipart(
        &self,
        url: &str,
        payload: &Payload,
    ) -> anyhow::Result<DeliveryResponse> {
        let form = match payload {
            Payload::Text(text) => Form::new().text("content", text.clone()),
            Payload::File { name, bytes } => {
                Form::new().part("file", Part::bytes(bytes.clone()).file_name(name.clone()))
            }
        };

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        Ok(DeliveryResponse {
            ok: response.status().is_success(),
            status: response.status().as_u16(),
        })
    }
}
