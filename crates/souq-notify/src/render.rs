//! Human-readable text and deep links for each domain event.

use serde_json::json;

use souq_types::events::DomainEvent;

/// Longest message preview shown in a notification, in characters.
const PREVIEW_CHARS: usize = 120;

pub struct Rendered {
    pub title: String,
    pub content: String,
    pub action_url: Option<String>,
    pub metadata: serde_json::Value,
}

pub fn render(event: &DomainEvent) -> Rendered {
    let icon = event.kind().icon();

    match event {
        DomainEvent::NewMessage {
            message_id,
            from_user_id,
            sender_name,
            preview,
            project_id,
        } => Rendered {
            title: format!("New message from {}", sender_name),
            content: truncate(preview, PREVIEW_CHARS),
            action_url: Some(format!("/messages/{}", from_user_id)),
            metadata: json!({
                "icon": icon,
                "message_id": message_id,
                "from_user_id": from_user_id,
                "project_id": project_id,
            }),
        },

        DomainEvent::NewOffer {
            offer_id,
            project_id,
            project_title,
            provider_name,
            price,
        } => Rendered {
            title: format!("New offer on {}", project_title),
            content: match price {
                Some(price) => format!("{} submitted an offer for {}", provider_name, price),
                None => format!("{} submitted an offer", provider_name),
            },
            action_url: Some(format!("/projects/{}/offers/{}", project_id, offer_id)),
            metadata: json!({
                "icon": icon,
                "offer_id": offer_id,
                "project_id": project_id,
            }),
        },

        DomainEvent::ProjectStatusChanged {
            project_id,
            project_title,
            status,
        } => Rendered {
            title: "Project status updated".to_string(),
            content: format!("{} is now {}", project_title, status.replace('_', " ")),
            action_url: Some(format!("/projects/{}", project_id)),
            metadata: json!({
                "icon": icon,
                "project_id": project_id,
                "status": status,
            }),
        },

        DomainEvent::PaymentConfirmed {
            payment_id,
            project_id,
            amount,
            currency,
        } => Rendered {
            title: "Payment confirmed".to_string(),
            content: format!("Your payment of {} {} was confirmed", amount, currency),
            action_url: Some(format!("/payments/{}", payment_id)),
            metadata: json!({
                "icon": icon,
                "payment_id": payment_id,
                "project_id": project_id,
            }),
        },

        DomainEvent::System {
            title,
            content,
            action_url,
        } => Rendered {
            title: title.clone(),
            content: content.clone(),
            action_url: action_url.clone(),
            metadata: json!({ "icon": icon }),
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn message_preview_is_truncated_on_char_boundary() {
        let long = "ت".repeat(200);
        let rendered = render(&DomainEvent::NewMessage {
            message_id: Uuid::new_v4(),
            from_user_id: Uuid::nil(),
            sender_name: "Sara".into(),
            preview: long,
            project_id: None,
        });
        assert_eq!(rendered.content.chars().count(), PREVIEW_CHARS + 1);
        assert!(rendered.content.ends_with('…'));
        assert_eq!(
            rendered.action_url.as_deref(),
            Some("/messages/00000000-0000-0000-0000-000000000000")
        );
        assert_eq!(rendered.metadata["icon"], "message-circle");
    }

    #[test]
    fn offer_links_back_to_offer() {
        let (offer_id, project_id) = (Uuid::new_v4(), Uuid::new_v4());
        let rendered = render(&DomainEvent::NewOffer {
            offer_id,
            project_id,
            project_title: "Mobile app".into(),
            provider_name: "Omar".into(),
            price: Some("1500 SAR".into()),
        });
        assert_eq!(rendered.title, "New offer on Mobile app");
        assert_eq!(rendered.content, "Omar submitted an offer for 1500 SAR");
        assert_eq!(
            rendered.action_url,
            Some(format!("/projects/{}/offers/{}", project_id, offer_id))
        );
    }

    #[test]
    fn status_is_humanized() {
        let rendered = render(&DomainEvent::ProjectStatusChanged {
            project_id: Uuid::nil(),
            project_title: "Logo".into(),
            status: "in_progress".into(),
        });
        assert_eq!(rendered.content, "Logo is now in progress");
    }
}
