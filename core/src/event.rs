//! Inbound events: what the transport delivers back into the core.
//!
//! Events are named `<model>/<operation><Phase>` (`zone/createStart`,
//! `pod/composeError`), `<model>/<create|update|delete>Notify` for push
//! notifications, and `<model>/cleanup`. [`EventType`] parses and formats
//! those names; [`InboundEvent`] is the JSON wire shape and decodes into a
//! typed [`CollectionAction`].

use crate::action::{CollectionAction, Notification, Operation, Payload, Phase};
use crate::entity::Entity;
use crate::envelope::{Envelope, target_key};
use crate::error::{RegistryError, SyncError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of push notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotifyKind {
    /// `createNotify`
    Create,
    /// `updateNotify`
    Update,
    /// `deleteNotify`
    Delete,
}

impl NotifyKind {
    const fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// What an event means, independent of its model
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A request lifecycle transition
    Lifecycle(Operation, Phase),
    /// A push notification
    Notify(NotifyKind),
    /// `cleanup`
    Cleanup,
}

/// Parsed event type string
///
/// ```
/// use entity_sync_core::event::{EventKind, EventType};
/// use entity_sync_core::action::{Operation, Phase};
///
/// let parsed: EventType = "pod/composeStart".parse().unwrap();
/// assert_eq!(parsed.model, "pod");
/// assert_eq!(parsed.kind, EventKind::Lifecycle(Operation::custom("compose"), Phase::Start));
/// assert_eq!(parsed.to_string(), "pod/composeStart");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventType {
    /// Resource model tag
    pub model: String,
    /// Meaning of the event
    pub kind: EventKind,
}

impl EventType {
    /// Lifecycle event type for an envelope's operation
    #[must_use]
    pub fn lifecycle(envelope: &Envelope, phase: Phase) -> Self {
        Self {
            model: envelope.resource_model.clone(),
            kind: EventKind::Lifecycle(envelope.operation.clone(), phase),
        }
    }
}

impl FromStr for EventType {
    type Err = RegistryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || RegistryError::MalformedEventType(raw.to_string());
        let (model, name) = raw.split_once('/').ok_or_else(malformed)?;
        if model.is_empty() || name.is_empty() || name.contains('/') {
            return Err(malformed());
        }

        let kind = if name == "cleanup" {
            EventKind::Cleanup
        } else if let Some(operation) = name.strip_suffix("Notify") {
            match operation {
                "create" => EventKind::Notify(NotifyKind::Create),
                "update" => EventKind::Notify(NotifyKind::Update),
                "delete" => EventKind::Notify(NotifyKind::Delete),
                _ => return Err(malformed()),
            }
        } else {
            let (operation, phase) = [Phase::Start, Phase::Success, Phase::Error]
                .into_iter()
                .find_map(|phase| name.strip_suffix(phase.suffix()).map(|op| (op, phase)))
                .ok_or_else(malformed)?;
            if operation.is_empty() {
                return Err(malformed());
            }
            EventKind::Lifecycle(Operation::parse(operation), phase)
        };

        Ok(Self {
            model: model.to_string(),
            kind,
        })
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Lifecycle(operation, phase) => {
                write!(f, "{}/{operation}{}", self.model, phase.suffix())
            },
            EventKind::Notify(kind) => write!(f, "{}/{}Notify", self.model, kind.name()),
            EventKind::Cleanup => write!(f, "{}/cleanup", self.model),
        }
    }
}

/// Extra information attached to an event
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Params of the request the event answers (or the bare primary key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Value>,
}

/// An event as delivered by the transport
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// `<model>/<operation><Phase>`, `<model>/<kind>Notify` or `<model>/cleanup`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data
    #[serde(default)]
    pub payload: Value,
    /// Request params the event relates to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EventMeta>,
    /// Set on error events
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl InboundEvent {
    /// An event with the given type and payload
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            meta: None,
            error: false,
        }
    }

    /// Attach the params of the originating request
    #[must_use]
    pub fn with_item(mut self, item: Option<Value>) -> Self {
        self.meta = item.map(|item| EventMeta { item: Some(item) });
        self
    }

    /// `<operation>Start` for an envelope
    #[must_use]
    pub fn start(envelope: &Envelope) -> Self {
        Self::new(EventType::lifecycle(envelope, Phase::Start).to_string(), Value::Null)
            .with_item(envelope.params.clone())
    }

    /// `<operation>Success` for an envelope, carrying the call's result
    #[must_use]
    pub fn success(envelope: &Envelope, result: Value) -> Self {
        Self::new(EventType::lifecycle(envelope, Phase::Success).to_string(), result)
            .with_item(envelope.params.clone())
    }

    /// `<operation>Error` for an envelope
    #[must_use]
    pub fn failure(envelope: &Envelope, error: &SyncError) -> Self {
        let payload = serde_json::to_value(error).unwrap_or(Value::Null);
        let mut event = Self::new(EventType::lifecycle(envelope, Phase::Error).to_string(), payload)
            .with_item(envelope.params.clone());
        event.error = true;
        event
    }

    /// A push notification for `model`
    #[must_use]
    pub fn notify(model: &str, kind: NotifyKind, payload: Value) -> Self {
        let event_type = EventType {
            model: model.to_string(),
            kind: EventKind::Notify(kind),
        };
        Self::new(event_type.to_string(), payload)
    }

    /// Parse the event type
    ///
    /// # Errors
    ///
    /// [`RegistryError::MalformedEventType`] if the type does not follow the
    /// naming convention.
    pub fn parsed_type(&self) -> Result<EventType, RegistryError> {
        self.event_type.parse()
    }

    /// Decode into a typed action for `E`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::MalformedEventType`] for an unparseable type and
    /// [`RegistryError::Payload`] when the payload does not have the shape the
    /// event requires (an entity, a list of entities, a primary key).
    pub fn decode<E: Entity>(&self) -> Result<CollectionAction<E>, RegistryError> {
        let parsed = self.parsed_type()?;
        self.decode_kind(parsed.kind)
    }

    pub(crate) fn decode_kind<E: Entity>(&self, kind: EventKind) -> Result<CollectionAction<E>, RegistryError> {
        let item = || {
            self.meta
                .as_ref()
                .and_then(|meta| target_key::<E>(meta.item.as_ref()))
        };

        let action = match kind {
            EventKind::Cleanup => CollectionAction::Cleanup,
            EventKind::Notify(NotifyKind::Create) => CollectionAction::Notify(Notification::Create(self.payload()?)),
            EventKind::Notify(NotifyKind::Update) => CollectionAction::Notify(Notification::Update(self.payload()?)),
            EventKind::Notify(NotifyKind::Delete) => CollectionAction::Notify(Notification::Delete(self.payload()?)),
            EventKind::Lifecycle(operation, Phase::Start) => CollectionAction::Start {
                operation,
                item: item(),
            },
            EventKind::Lifecycle(operation, Phase::Error) => CollectionAction::Error {
                operation,
                item: item(),
                error: SyncError::from_value(self.payload.clone()),
            },
            EventKind::Lifecycle(operation, Phase::Success) => {
                let payload = match &operation {
                    Operation::Fetch => Payload::Items(self.payload()?),
                    Operation::Get => Payload::Item(self.payload()?),
                    Operation::SetActive => self.payload::<Option<E>>()?.map_or(Payload::None, Payload::Item),
                    Operation::Custom(name) => match E::lookup(name) {
                        Some(lookup) => Payload::Lookup {
                            key: self.item_param(lookup.key_param),
                            value: self.payload.clone(),
                        },
                        None => serde_json::from_value::<E>(self.payload.clone())
                            .map_or(Payload::None, Payload::Item),
                    },
                    Operation::Create | Operation::Update | Operation::Delete => Payload::None,
                };
                let item = match &payload {
                    Payload::Item(entity) if item().is_none() => Some(entity.key()),
                    _ => item(),
                };
                CollectionAction::Success {
                    operation,
                    item,
                    payload,
                }
            },
        };
        Ok(action)
    }

    /// A request param from `meta.item`, as a string
    fn item_param(&self, name: &str) -> Option<String> {
        let item = self.meta.as_ref()?.item.as_ref()?;
        match item.get(name)? {
            Value::Null => None,
            Value::String(value) => Some(value.clone()),
            other => Some(other.to_string()),
        }
    }

    fn payload<T: DeserializeOwned>(&self) -> Result<T, RegistryError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| RegistryError::Payload {
            event: self.event_type.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Zone {
        id: u32,
        name: String,
    }

    impl Entity for Zone {
        type Key = u32;
        const MODEL: &'static str = "zone";
        const PRIMARY_KEY: &'static str = "id";

        fn key(&self) -> u32 {
            self.id
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Host {
        id: u32,
    }

    impl Entity for Host {
        type Key = u32;
        const MODEL: &'static str = "host";
        const PRIMARY_KEY: &'static str = "id";
        const LOOKUPS: &'static [crate::entity::Lookup] =
            &[crate::entity::Lookup::new("getProjects", "projects", "power_address")];

        fn key(&self) -> u32 {
            self.id
        }
    }

    fn zone(id: u32, name: &str) -> Zone {
        Zone {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_parse_event_types() {
        let parsed: Result<EventType, _> = "zone/fetchSuccess".parse();
        assert!(matches!(
            parsed,
            Ok(EventType { ref model, kind: EventKind::Lifecycle(Operation::Fetch, Phase::Success) }) if model == "zone"
        ));

        let parsed: Result<EventType, _> = "machine/setActiveError".parse();
        assert!(matches!(
            parsed,
            Ok(EventType { kind: EventKind::Lifecycle(Operation::SetActive, Phase::Error), .. })
        ));

        let parsed: Result<EventType, _> = "vlan/deleteNotify".parse();
        assert!(matches!(
            parsed,
            Ok(EventType { kind: EventKind::Notify(NotifyKind::Delete), .. })
        ));

        let parsed: Result<EventType, _> = "tag/cleanup".parse();
        assert!(matches!(parsed, Ok(EventType { kind: EventKind::Cleanup, .. })));
    }

    #[test]
    fn test_reject_malformed_event_types() {
        for raw in [
            "zone",
            "/fetchStart",
            "zone/",
            "zone/fetch",
            "zone/Start",
            "zone/composeNotify",
            "zone/a/fetchStart",
        ] {
            let parsed: Result<EventType, _> = raw.parse();
            assert!(
                matches!(parsed, Err(RegistryError::MalformedEventType(ref t)) if t == raw),
                "expected {raw} to be rejected"
            );
        }
    }

    #[test]
    fn test_decode_fetch_success() {
        let event = InboundEvent::new(
            "zone/fetchSuccess",
            json!([{"id": 1, "name": "z1"}, {"id": 2, "name": "z2"}]),
        );
        let action = event.decode::<Zone>().ok();
        assert_eq!(
            action,
            Some(CollectionAction::fetch_success(vec![zone(1, "z1"), zone(2, "z2")]))
        );
    }

    #[test]
    fn test_decode_uses_meta_item_for_key() {
        let event = InboundEvent::new("zone/deleteStart", Value::Null).with_item(Some(json!({"id": 7})));
        assert_eq!(
            event.decode::<Zone>().ok(),
            Some(CollectionAction::start(Operation::Delete, Some(7)))
        );
    }

    #[test]
    fn test_decode_error_payloads() {
        let event = InboundEvent::new("zone/createError", json!({"name": ["Name already exists"]}));
        let Ok(CollectionAction::Error { operation, error, .. }) = event.decode::<Zone>() else {
            unreachable!("createError decodes to an error action");
        };
        assert_eq!(operation, Operation::Create);
        assert_eq!(error.field("name"), vec!["Name already exists"]);
    }

    #[test]
    fn test_decode_notifications() {
        let event = InboundEvent::notify("zone", NotifyKind::Update, json!({"id": 1, "name": "renamed"}));
        assert_eq!(
            event.decode::<Zone>().ok(),
            Some(CollectionAction::update_notify(zone(1, "renamed")))
        );

        let event = InboundEvent::notify("zone", NotifyKind::Delete, json!(1));
        assert_eq!(event.decode::<Zone>().ok(), Some(CollectionAction::delete_notify(1)));
    }

    #[test]
    fn test_decode_set_active_null_clears() {
        let event = InboundEvent::new("zone/setActiveSuccess", Value::Null);
        assert_eq!(
            event.decode::<Zone>().ok(),
            Some(CollectionAction::set_active_success(None))
        );
    }

    #[test]
    fn test_decode_bad_payload_is_an_error() {
        let event = InboundEvent::new("zone/createNotify", json!({"name": "no id"}));
        assert!(matches!(
            event.decode::<Zone>(),
            Err(RegistryError::Payload { ref event, .. }) if event == "zone/createNotify"
        ));
    }

    #[test]
    fn test_wire_format() {
        let raw = r#"{"type": "zone/updateNotify", "payload": {"id": 3, "name": "z3"}}"#;
        let event: Result<InboundEvent, _> = serde_json::from_str(raw);
        assert!(matches!(
            event.as_ref().map(|e| e.decode::<Zone>()),
            Ok(Ok(CollectionAction::Notify(Notification::Update(ref z)))) if z.id == 3
        ));
    }

    #[test]
    fn test_decode_lookup_success_keys_by_param() {
        let event = InboundEvent::new("host/getProjectsSuccess", json!([{"name": "default"}]))
            .with_item(Some(json!({"power_address": "10.0.0.2"})));
        assert_eq!(
            event.decode::<Host>().ok(),
            Some(CollectionAction::Success {
                operation: Operation::Custom("getProjects".to_string()),
                item: None,
                payload: Payload::Lookup {
                    key: Some("10.0.0.2".to_string()),
                    value: json!([{"name": "default"}]),
                },
            })
        );
    }
}
