//! Admin notifications for public form submissions
//!
//! Notifications are fire-and-forget: the submission has already been
//! stored, so a failed notification is logged and otherwise ignored.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{escape_html, Mailer, OutgoingMail};
use crate::models::consultation::Consultation;
use crate::models::contact_message::ContactMessage;

/// Notice sent to the site owner for a new consultation request
pub fn consultation_notice(to: &str, consultation: &Consultation) -> OutgoingMail {
    let optional = |value: &Option<String>| value.as_deref().unwrap_or("-").to_string();
    let preferred = consultation
        .preferred_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());

    let rows = [
        ("Name", consultation.name.clone()),
        ("Email", consultation.email.clone()),
        ("Phone", optional(&consultation.phone)),
        ("Company", optional(&consultation.company)),
        ("Project type", consultation.project_type.clone()),
        ("Budget", optional(&consultation.budget)),
        ("Timeline", optional(&consultation.timeline)),
        ("Preferred date", preferred),
    ];

    let table: String = rows
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><td><strong>{}</strong></td><td>{}</td></tr>",
                label,
                escape_html(value)
            )
        })
        .collect();

    let html = format!(
        "<h2>New consultation request</h2><table>{}</table><h3>Message</h3><p>{}</p>",
        table,
        escape_html(&consultation.message).replace('\n', "<br>")
    );

    let text = format!(
        "New consultation request\n\n{}\n\nMessage:\n{}",
        rows.iter()
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n"),
        consultation.message
    );

    OutgoingMail {
        to: to.to_string(),
        subject: format!(
            "New consultation: {} ({})",
            consultation.name, consultation.project_type
        ),
        html,
        text,
    }
}

/// Notice sent to the site owner for a new contact message
pub fn contact_notice(to: &str, message: &ContactMessage) -> OutgoingMail {
    let subject_line = message.subject.as_deref().unwrap_or("(no subject)");

    let html = format!(
        "<h2>New contact message</h2>\
         <p><strong>From:</strong> {} &lt;{}&gt;</p>\
         <p><strong>Subject:</strong> {}</p><p>{}</p>",
        escape_html(&message.name),
        escape_html(&message.email),
        escape_html(subject_line),
        escape_html(&message.message).replace('\n', "<br>")
    );

    let text = format!(
        "New contact message\n\nFrom: {} <{}>\nSubject: {}\n\n{}",
        message.name, message.email, subject_line, message.message
    );

    OutgoingMail {
        to: to.to_string(),
        subject: format!("Contact form: {}", subject_line),
        html,
        text,
    }
}

/// Sends `mail` in the background, logging the outcome
pub fn spawn_notification(mailer: Arc<dyn Mailer>, mail: OutgoingMail) {
    tokio::spawn(async move {
        match mailer.send(&mail).await {
            Ok(()) => debug!(to = %mail.to, subject = %mail.subject, "Notification sent"),
            Err(e) => warn!(to = %mail.to, error = %e, "Failed to send notification"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::consultation::ConsultationStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn consultation() -> Consultation {
        Consultation {
            id: Uuid::new_v4(),
            name: "Sam <Admin>".to_string(),
            email: "sam@example.com".to_string(),
            phone: None,
            company: Some("Sam & Co".to_string()),
            project_type: "E-commerce".to_string(),
            budget: Some("$5k-$10k".to_string()),
            timeline: None,
            message: "Line one\nLine two".to_string(),
            preferred_date: None,
            status: ConsultationStatus::New,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_consultation_notice_escapes_input() {
        let mail = consultation_notice("owner@example.com", &consultation());

        assert_eq!(mail.to, "owner@example.com");
        assert!(mail.subject.contains("E-commerce"));
        assert!(mail.html.contains("Sam &lt;Admin&gt;"));
        assert!(mail.html.contains("Sam &amp; Co"));
        assert!(mail.html.contains("Line one<br>Line two"));
        assert!(mail.text.contains("Budget: $5k-$10k"));
    }

    #[test]
    fn test_contact_notice_without_subject() {
        let message = ContactMessage {
            id: Uuid::new_v4(),
            name: "Alex".to_string(),
            email: "alex@example.com".to_string(),
            subject: None,
            message: "Hello".to_string(),
            read: false,
            created_at: Utc::now(),
        };

        let mail = contact_notice("owner@example.com", &message);
        assert_eq!(mail.subject, "Contact form: (no subject)");
        assert!(mail.text.contains("From: Alex <alex@example.com>"));
    }
}
