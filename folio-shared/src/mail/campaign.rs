//! Newsletter campaign rendering and delivery
//!
//! Each recipient gets a personalised copy of the campaign HTML:
//!
//! - `{{name}}` and `{{email}}` placeholders are filled in
//! - absolute http(s) links go through the click tracker
//!   (`/api/campaigns/:id/click?url=...`)
//! - a 1×1 tracking pixel (`/api/campaigns/:id/open`) and an unsubscribe
//!   footer are appended
//!
//! Delivery is sequential. A failure for one recipient is logged and
//! counted, and the run continues with the next recipient.

use tracing::{debug, warn};
use url::form_urlencoded;
use uuid::Uuid;

use super::{escape_html, html_to_text, Mailer, OutgoingMail};
use crate::models::campaign::Campaign;
use crate::models::subscriber::NewsletterSubscriber;

/// Greeting used for `{{name}}` when the subscriber gave no name
const DEFAULT_GREETING_NAME: &str = "there";

/// Base URLs used in tracking and unsubscribe links
#[derive(Debug, Clone)]
pub struct CampaignLinks {
    /// Public base URL of this API
    pub public_url: String,

    /// Base URL of the website (hosts the unsubscribe page)
    pub site_url: String,
}

impl CampaignLinks {
    pub fn new(public_url: &str, site_url: &str) -> Self {
        Self {
            public_url: public_url.trim_end_matches('/').to_string(),
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn open_pixel(&self, campaign_id: Uuid) -> String {
        format!("{}/api/campaigns/{}/open", self.public_url, campaign_id)
    }

    pub fn click(&self, campaign_id: Uuid, target: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
        format!(
            "{}/api/campaigns/{}/click?url={}",
            self.public_url, campaign_id, encoded
        )
    }

    pub fn unsubscribe(&self, token: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(token.as_bytes()).collect();
        format!("{}/unsubscribe?token={}", self.site_url, encoded)
    }
}

/// Counts from one delivery run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: i32,
    pub failed: i32,
}

impl std::ops::AddAssign for DeliveryReport {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

fn is_http_link(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Routes every absolute http(s) `href` through the click tracker
///
/// Other links (mailto:, anchors, relative paths) are left untouched.
pub fn rewrite_links(html: &str, campaign_id: Uuid, links: &CampaignLinks) -> String {
    // ASCII lowercasing keeps byte offsets, so `lower` indexes `html` directly
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len() + 64);
    let mut cursor = 0;

    while let Some(pos) = lower[cursor..].find("href=") {
        let value_start = cursor + pos + "href=".len();
        out.push_str(&html[cursor..value_start]);
        cursor = value_start;

        let rest = &html[cursor..];
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };

        let Some(len) = rest[1..].find(quote) else {
            continue;
        };

        let target = &rest[1..1 + len];
        if is_http_link(target) {
            let decoded = target.trim().replace("&amp;", "&");
            out.push(quote);
            out.push_str(&escape_html(&links.click(campaign_id, &decoded)));
            out.push(quote);
        } else {
            out.push_str(&rest[..len + 2]);
        }
        cursor += len + 2;
    }

    out.push_str(&html[cursor..]);
    out
}

/// Appends the open pixel and unsubscribe footer, inside `</body>` when present
fn append_footer(html: &str, campaign_id: Uuid, unsubscribe_url: &str, links: &CampaignLinks) -> String {
    let footer = format!(
        "<p style=\"font-size:12px;color:#888\">You are receiving this because you subscribed \
         to our newsletter. <a href=\"{}\">Unsubscribe</a></p>\
         <img src=\"{}\" width=\"1\" height=\"1\" alt=\"\" style=\"display:none\">",
        escape_html(unsubscribe_url),
        escape_html(&links.open_pixel(campaign_id))
    );

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], footer, &html[pos..]),
        None => format!("{}{}", html, footer),
    }
}

fn render(
    campaign: &Campaign,
    to: &str,
    name: Option<&str>,
    unsubscribe_token: &str,
    links: &CampaignLinks,
) -> OutgoingMail {
    let greeting = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_GREETING_NAME);

    let body = campaign
        .content
        .replace("{{name}}", &escape_html(greeting))
        .replace("{{email}}", &escape_html(to));

    let unsubscribe_url = links.unsubscribe(unsubscribe_token);
    let text = format!(
        "{}\n\n--\nUnsubscribe: {}",
        html_to_text(&body),
        unsubscribe_url
    );

    let tracked = rewrite_links(&body, campaign.id, links);
    let html = append_footer(&tracked, campaign.id, &unsubscribe_url, links);

    OutgoingMail {
        to: to.to_string(),
        subject: campaign.subject.replace("{{name}}", greeting),
        html,
        text,
    }
}

/// Personalised message for one subscriber
pub fn render_for_subscriber(
    campaign: &Campaign,
    subscriber: &NewsletterSubscriber,
    links: &CampaignLinks,
) -> OutgoingMail {
    render(
        campaign,
        &subscriber.email,
        subscriber.name.as_deref(),
        &subscriber.unsubscribe_token,
        links,
    )
}

/// Preview sent to an arbitrary address; the unsubscribe link is inert
pub fn render_test(campaign: &Campaign, to: &str, links: &CampaignLinks) -> OutgoingMail {
    let mut mail = render(campaign, to, None, "preview", links);
    mail.subject = format!("[Test] {}", mail.subject);
    mail
}

/// Sends the campaign to every recipient, counting successes and failures
///
/// Callers with a large list deliver it in batches and record progress in
/// between.
pub async fn deliver(
    mailer: &dyn Mailer,
    campaign: &Campaign,
    recipients: &[NewsletterSubscriber],
    links: &CampaignLinks,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for subscriber in recipients {
        let mail = render_for_subscriber(campaign, subscriber, links);

        match mailer.send(&mail).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    campaign_id = %campaign.id,
                    subscriber_id = %subscriber.id,
                    error = %e,
                    "Campaign delivery failed for recipient"
                );
            }
        }
    }

    debug!(
        campaign_id = %campaign.id,
        sent = report.sent,
        failed = report.failed,
        "Campaign batch delivered"
    );

    report
}
