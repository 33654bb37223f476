//! In-process notification hub for collator lifecycle events.
//!
//! Handlers registered under an event name run in registration order; each
//! receives the payload returned by the previous one.

use crate::model::address::Address;
use crate::model::container::Container;
use crate::model::content::Content;
use log::warn;
use std::collections::BTreeMap;
use std::mem::discriminant;
use std::sync::Arc;

/// A new content item was materialized.
pub const EVENT_CONTENT_NEW: &str = "ContentItem.New";
/// A container was resolved for content about to be written.
pub const EVENT_GET_CONTAINER: &str = "Collator.GetContainer";
/// A content item is moving to another address.
pub const EVENT_CONTENT_MOVE: &str = "Content.Move";

/// Event payloads; handlers return a payload of the same variant.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    NewItem(Content),
    GetContainer {
        content: Content,
        container: Container,
    },
    Move {
        to: Address,
        container: Container,
    },
    /// Content whose address fields disagree with the address it is being
    /// written to.
    AddressChanged {
        to: Address,
        content: Content,
    },
}

/// Notification hook.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &str, payload: EventPayload) -> EventPayload;
}

impl<F> EventHandler for F
where
    F: Fn(&str, EventPayload) -> EventPayload + Send + Sync,
{
    fn on_event(&self, event: &str, payload: EventPayload) -> EventPayload {
        self(event, payload)
    }
}

/// Registry of event handlers keyed by event name.
#[derive(Default, Clone)]
pub struct EventHub {
    handlers: BTreeMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .entry(event.trim().to_string())
            .or_default()
            .push(handler);
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map_or(0, Vec::len)
    }

    /// Runs every handler for `event` over `payload`.
    ///
    /// A handler returning a different payload variant is ignored.
    pub fn process_event(&self, event: &str, payload: EventPayload) -> EventPayload {
        let Some(handlers) = self.handlers.get(event) else {
            return payload;
        };
        handlers.iter().fold(payload, |current, handler| {
            let fallback = current.clone();
            let next = handler.on_event(event, current);
            if discriminant(&next) == discriminant(&fallback) {
                next
            } else {
                warn!("event=process_event module=events status=warn event_name={event} reason=payload_variant_changed");
                fallback
            }
        })
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.handlers.iter().map(|(name, list)| (name, list.len())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{EventHub, EventPayload, EVENT_CONTENT_NEW};
    use crate::model::content::Content;
    use crate::model::version::ItemVersion;
    use crate::model::TypeName;
    use serde_json::json;
    use std::sync::Arc;

    fn new_item() -> EventPayload {
        EventPayload::NewItem(Content::new(
            TypeName::from("Article"),
            ItemVersion::new(),
            json!({}),
        ))
    }

    #[test]
    fn handlers_chain_in_registration_order() {
        let mut hub = EventHub::new();
        hub.register(
            EVENT_CONTENT_NEW,
            Arc::new(|_: &str, payload: EventPayload| match payload {
                EventPayload::NewItem(mut content) => {
                    content.data["Title"] = json!("first");
                    EventPayload::NewItem(content)
                }
                other => other,
            }),
        );
        hub.register(
            EVENT_CONTENT_NEW,
            Arc::new(|_: &str, payload: EventPayload| match payload {
                EventPayload::NewItem(mut content) => {
                    let title = content.str_field("Title").unwrap_or_default().to_string();
                    content.data["Title"] = json!(format!("{title}+second"));
                    EventPayload::NewItem(content)
                }
                other => other,
            }),
        );

        let EventPayload::NewItem(content) = hub.process_event(EVENT_CONTENT_NEW, new_item())
        else {
            panic!("payload variant changed");
        };
        assert_eq!(content.str_field("Title"), Some("first+second"));
    }

    #[test]
    fn unknown_event_returns_payload_unchanged() {
        let hub = EventHub::new();
        assert_eq!(hub.process_event("Nothing", new_item()), new_item());
    }

    #[test]
    fn variant_changing_handler_is_ignored() {
        let mut hub = EventHub::new();
        hub.register(
            EVENT_CONTENT_NEW,
            Arc::new(|_: &str, _payload: EventPayload| EventPayload::Move {
                to: crate::model::address::Address::new(TypeName::from("Article")),
                container: crate::model::container::Container::new(TypeName::from("Article")),
            }),
        );
        assert_eq!(hub.process_event(EVENT_CONTENT_NEW, new_item()), new_item());
    }
}
