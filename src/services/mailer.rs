// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound email.
//!
//! [`Mailer`] is the delivery seam. [`HttpMailer`] posts to a transactional
//! mail API; [`LogMailer`] only logs and is used when no API is configured.

use crate::config::Config;
use crate::error::AppError;
use async_trait::async_trait;
use serde::Serialize;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl EmailMessage {
    /// Verification link mail for a freshly issued verification token.
    pub fn verification(to: &str, frontend_url: &str, token: &str) -> Self {
        let url = format!(
            "{}/verify-email/{}",
            frontend_url.trim_end_matches('/'),
            urlencoding::encode(token)
        );
        Self {
            to: to.to_string(),
            subject: "Verify Your Email - Level Up".to_string(),
            html: format!(
                "<p>Please verify your email by clicking the link below:</p>\
                 <a href=\"{url}\">Verify Email</a>\
                 <p>This link will expire in 24 hours.</p>"
            ),
            text: format!(
                "Please verify your email by visiting: {url}\nThis link will expire in 24 hours."
            ),
        }
    }

    pub fn welcome(to: &str, username: &str, frontend_url: &str) -> Self {
        let login_url = format!("{}/login", frontend_url.trim_end_matches('/'));
        let name = escape_html(username);
        Self {
            to: to.to_string(),
            subject: "Welcome to Level Up!".to_string(),
            html: format!(
                "<h1>Welcome to Level Up!</h1>\
                 <p>Hi {name},</p>\
                 <p>Thank you for joining Level Up! We're excited to help you achieve your fitness goals.</p>\
                 <a href=\"{login_url}\">Get Started</a>"
            ),
            text: format!("Welcome to Level Up, {username}! You can now log in at: {login_url}"),
        }
    }
}

fn escape_html(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            other => other.to_string(),
        })
        .collect()
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError>;
}

/// Logs recipient and subject only; bodies can carry verification links.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        tracing::info!(to = %message.to, subject = %message.subject, "Email (log only)");
        Ok(())
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// JSON-over-HTTP transactional mail client.
#[derive(Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: Option<String>, from: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        let body = SendRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let mut request = self.http.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Mail(format!("HTTP {}: {}", status, text)));
        }

        tracing::debug!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Pick the mailer implied by the configuration.
pub fn from_config(config: &Config) -> std::sync::Arc<dyn Mailer> {
    match &config.mail_api_url {
        Some(url) => std::sync::Arc::new(HttpMailer::new(
            url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        )),
        None => std::sync::Arc::new(LogMailer),
    }
}
