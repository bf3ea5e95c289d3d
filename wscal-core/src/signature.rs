//! Content fingerprints used for duplicate detection.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::event::{CalendarEvent, NewEvent};
use crate::time::iso_string;

/// `title|description|start|end`, with times in their persisted ISO form.
///
/// Matching is exact. Times must be rounded before a signature is taken.
/// `|` and `\` inside the text fields are backslash-escaped so field
/// boundaries stay unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSignature(String);

impl EventSignature {
    pub fn new(
        title: &str,
        description: &str,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Self {
        EventSignature(format!(
            "{}|{}|{}|{}",
            escape(title),
            escape(description),
            iso_string(start_at),
            iso_string(end_at)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape(field: &str) -> String {
    field.replace('\\', "\\\\").replace('|', "\\|")
}

impl fmt::Display for EventSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&CalendarEvent> for EventSignature {
    fn from(event: &CalendarEvent) -> Self {
        EventSignature::new(&event.title, &event.description, event.start_at, event.end_at)
    }
}

impl From<&NewEvent> for EventSignature {
    fn from(event: &NewEvent) -> Self {
        EventSignature::new(&event.title, &event.description, event.start_at, event.end_at)
    }
}

/// First event in `events` with the given signature.
pub fn find_by_signature<'a>(
    events: impl IntoIterator<Item = &'a CalendarEvent>,
    signature: &EventSignature,
) -> Option<&'a CalendarEvent> {
    events
        .into_iter()
        .find(|event| EventSignature::from(*event) == *signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::SupportedColor;
    use chrono::TimeZone;

    fn event(id: &str, title: &str, minute: u32) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            title: title.into(),
            description: "notes".into(),
            location: "room 1".into(),
            start_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, minute, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            color: SupportedColor::Blue,
            locked: false,
            google_event_id: None,
            ws_id: "ws".into(),
        }
    }

    #[test]
    fn test_signature_format() {
        let sig = EventSignature::from(&event("a", "Standup", 0));
        assert_eq!(
            sig.as_str(),
            "Standup|notes|2024-01-01T09:00:00.000Z|2024-01-01T10:00:00.000Z"
        );
    }

    #[test]
    fn test_signature_ignores_location_and_color() {
        let a = event("a", "Standup", 0);
        let mut b = event("b", "Standup", 0);
        b.location = "elsewhere".into();
        b.color = SupportedColor::Red;

        assert_eq!(EventSignature::from(&a), EventSignature::from(&b));
    }

    #[test]
    fn test_separator_in_text_does_not_collide() {
        let mut a = event("a", "a|b", 0);
        a.description = "c".into();
        let mut b = event("b", "a", 0);
        b.description = "b|c".into();

        assert_ne!(EventSignature::from(&a), EventSignature::from(&b));
        assert!(EventSignature::from(&a).as_str().starts_with("a\\|b|c|"));
    }

    #[test]
    fn test_escaped_backslash_does_not_collide() {
        let mut a = event("a", "x\\", 0);
        a.description = "|y".into();
        let mut b = event("b", "x\\|", 0);
        b.description = "y".into();

        assert_ne!(EventSignature::from(&a), EventSignature::from(&b));
    }

    #[test]
    fn test_find_is_exact() {
        let events = vec![event("a", "Standup", 15), event("b", "Standup", 0)];
        let wanted = EventSignature::from(&event("x", "Standup", 0));

        assert_eq!(find_by_signature(&events, &wanted).map(|e| e.id.as_str()), Some("b"));

        let near = EventSignature::from(&event("x", "Standup", 1));
        assert!(find_by_signature(&events, &near).is_none());
    }
}
