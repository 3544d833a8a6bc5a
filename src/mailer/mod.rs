//! Notification email delivery.
//!
//! The transport is an external capability behind the [`Mailer`] trait;
//! the production implementation posts to a transactional-email HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::MailerConfig;

#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("Email transport error: {0}")]
    Transport(String),

    #[error("Email API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryReceipt, MailerError>;
}

/// Mailer backed by an HTTP email API (Resend-compatible shape).
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailerConfig,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

impl HttpMailer {
    pub fn new(client: reqwest::Client, config: MailerConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryReceipt, MailerError> {
        let request = SendRequest {
            from: &self.config.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| MailerError::Transport(format!("Invalid send response: {}", e)))?;

        Ok(DeliveryReceipt {
            message_id: parsed.id,
        })
    }
}

/// Fixed HTML template for a new-post notification.
pub fn format_post_email(
    blog_title: &str,
    post_title: &str,
    description: &str,
    post_url: &str,
) -> String {
    let description = if description.is_empty() {
        "No description available."
    } else {
        description
    };

    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #0369a1; margin-bottom: 0;">New Post on {blog_title}</h1>
  <h2 style="margin-top: 10px; margin-bottom: 5px;">{post_title}</h2>
  <p style="color: #4b5563; margin-bottom: 20px;">{description}</p>
  <a href="{post_url}"
     style="background-color: #0ea5e9; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; display: inline-block;">
    Read Full Post
  </a>
  <p style="margin-top: 30px; font-size: 12px; color: #6b7280;">
    You received this email because you're subscribed to updates from {blog_title} via Feedmail.
  </p>
</div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_embeds_fields() {
        let html = format_post_email(
            "Example Blog",
            "A New Post",
            "Something happened.",
            "https://example.com/a-new-post",
        );
        assert!(html.contains("New Post on Example Blog"));
        assert!(html.contains("A New Post"));
        assert!(html.contains("Something happened."));
        assert!(html.contains("href=\"https://example.com/a-new-post\""));
    }

    #[test]
    fn test_template_falls_back_for_empty_description() {
        let html = format_post_email("B", "P", "", "https://example.com/p");
        assert!(html.contains("No description available."));
    }
}
