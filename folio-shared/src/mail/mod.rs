//! Outgoing email
//!
//! - `smtp`: lettre SMTP transport (async, STARTTLS)
//! - `notify`: admin notifications for form submissions
//! - `campaign`: newsletter campaign rendering and delivery
//!
//! Everything that sends mail goes through the [`Mailer`] trait so handlers
//! and tests can swap the transport. When SMTP is not configured the API
//! uses [`LogMailer`], which logs messages instead of delivering them.

pub mod campaign;
pub mod notify;
pub mod smtp;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// A rendered message with HTML and plain-text bodies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Mail transport error: {0}")]
    Transport(String),
}

/// Mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;

    /// False when messages are not actually delivered
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Logs messages instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            bytes = mail.html.len(),
            "SMTP not configured, message logged instead of sent"
        );
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Escapes text for safe inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Crude plain-text rendering of an HTML body for the text alternative
///
/// Drops tags, turns block-level closings into line breaks, decodes the
/// common entities and collapses runs of blank lines.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;

    for c in html.chars() {
        match (in_tag, c) {
            (false, '<') => {
                in_tag = true;
                tag.clear();
            }
            (true, '>') => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("")
                    .to_lowercase();
                if matches!(
                    name.as_str(),
                    "br" | "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
                ) {
                    text.push('\n');
                }
            }
            (true, _) => tag.push(c),
            (false, _) => text.push(c),
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let mut lines: Vec<&str> = Vec::new();
    for line in decoded.lines().map(str::trim) {
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_html_to_text() {
        let html = "<h1>News</h1><p>Hello &amp; welcome</p><p>Visit <a href=\"https://example.com\">us</a></p>";
        assert_eq!(html_to_text(html), "News\n\nHello & welcome\n\nVisit us");
    }

    #[test]
    fn test_html_to_text_collapses_blank_lines() {
        let html = "<p>One</p>\n\n\n<p>Two</p><br><br>";
        assert_eq!(html_to_text(html), "One\n\nTwo");
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let mailer = LogMailer;
        let mail = OutgoingMail {
            to: "someone@example.com".to_string(),
            subject: "Hi".to_string(),
            html: "<p>Hi</p>".to_string(),
            text: "Hi".to_string(),
        };

        assert!(mailer.send(&mail).await.is_ok());
        assert!(!mailer.is_enabled());
    }
}
