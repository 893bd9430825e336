//! Shared event types for regnotify.
//!
//! This crate models the notification envelope that a container registry
//! sends to its webhook endpoints. Every other crate in the workspace works
//! with [`Event`] values; only the store ever looks at their encoded form,
//! and only to search it.
//!
//! Field names on the wire follow the registry's JSON format (`mediaType`,
//! `instanceID`, ...). Optional fields that are empty are omitted when an
//! event is encoded again, so a decoded event re-encodes to an equivalent
//! document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action emitted when a manifest or blob is pushed.
pub const ACTION_PUSH: &str = "push";
/// Action emitted when a manifest or blob is pulled.
pub const ACTION_PULL: &str = "pull";
/// Action emitted when a blob is cross-mounted from another repository.
pub const ACTION_MOUNT: &str = "mount";
/// Action emitted when a manifest, tag or blob is deleted.
pub const ACTION_DELETE: &str = "delete";

/// A single registry notification.
///
/// `id` and `timestamp` are supplied by the producing registry; regnotify
/// never generates either. Everything else is payload that is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Producer-assigned unique identifier.
    pub id: String,
    /// When the registry observed the action.
    pub timestamp: DateTime<Utc>,
    /// The action that was performed (`push`, `pull`, `mount`, `delete`).
    #[serde(default)]
    pub action: String,
    /// The resource the action was performed on.
    #[serde(default)]
    pub target: Target,
    /// The request that triggered the event.
    #[serde(default)]
    pub request: RequestRecord,
    /// The authenticated actor, if any.
    #[serde(default)]
    pub actor: ActorRecord,
    /// The registry node that generated the event.
    #[serde(default)]
    pub source: SourceRecord,
}

/// Content descriptor, as used for referenced manifests and layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType", default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
    /// Alternate locations the content can be fetched from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Target of a registry action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Media type of the manifest or blob.
    #[serde(rename = "mediaType", default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// Size in bytes of the content.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: i64,
    /// Content digest, e.g. `sha256:...`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
    /// Legacy duplicate of `size` kept for older consumers.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub length: i64,
    /// Repository name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    /// Source repository of a cross-repository blob mount.
    #[serde(rename = "fromRepository", default, skip_serializing_if = "String::is_empty")]
    pub from_repository: String,
    /// Direct URL to the content.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Tag, when the action was performed through one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Alternate locations the content can be fetched from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// Descriptor annotations copied from the manifest.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Descriptors referenced by a manifest.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Descriptor>,
}

/// The HTTP request that triggered an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Remote address of the client.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub addr: String,
    /// Host the request was sent to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub useragent: String,
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// The registry instance that emitted an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Address of the emitting registry node.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub addr: String,
    /// Identifier of the running registry process.
    #[serde(rename = "instanceID", default, skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
}

/// Body of a notification delivery and of a read response.
///
/// A body without `events` is an empty batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub events: Vec<Event>,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl Event {
    /// Creates an event with the given identity and action and an empty payload.
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            action: action.into(),
            target: Target::default(),
            request: RequestRecord::default(),
            actor: ActorRecord::default(),
            source: SourceRecord::default(),
        }
    }

    /// Sets the target repository and tag.
    pub fn with_target(mut self, repository: impl Into<String>, tag: impl Into<String>) -> Self {
        self.target.repository = repository.into();
        self.target.tag = tag.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const REGISTRY_PUSH: &str = r#"{
        "id": "320678d8-ca14-430f-8bb6-4ca139cd83f7",
        "timestamp": "2016-03-09T14:44:26.402973972-08:00",
        "action": "push",
        "target": {
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "size": 708,
            "digest": "sha256:fea8895f450959fa676bcc1df0611ea93823a735a01205fd8622846041d0c7cf",
            "length": 708,
            "repository": "hello-world",
            "url": "http://192.168.100.227:5000/v2/hello-world/manifests/sha256:fea8895f450959fa676bcc1df0611ea93823a735a01205fd8622846041d0c7cf",
            "tag": "latest"
        },
        "request": {
            "id": "6df24a34-0959-4923-81ca-14f09767db19",
            "addr": "192.168.64.11:42961",
            "host": "192.168.100.227:5000",
            "method": "PUT",
            "useragent": "curl/7.38.0"
        },
        "actor": {},
        "source": {
            "addr": "xtal.local:5000",
            "instanceID": "a53db899-3b4b-4a62-a067-8dd013beaca4"
        }
    }"#;

    #[test]
    fn decodes_registry_notification() {
        let event: Event = serde_json::from_str(REGISTRY_PUSH).expect("should decode");

        assert_eq!(event.id, "320678d8-ca14-430f-8bb6-4ca139cd83f7");
        assert_eq!(event.action, ACTION_PUSH);
        assert_eq!(event.target.repository, "hello-world");
        assert_eq!(event.target.tag, "latest");
        assert_eq!(event.target.size, 708);
        assert_eq!(event.request.method, "PUT");
        assert_eq!(event.source.instance_id, "a53db899-3b4b-4a62-a067-8dd013beaca4");
        assert!(event.actor.name.is_empty());

        // The registry sent a local offset; it is normalised to UTC.
        let expected = Utc.with_ymd_and_hms(2016, 3, 9, 22, 44, 26).unwrap()
            + chrono::Duration::nanoseconds(402_973_972);
        assert_eq!(event.timestamp, expected);
    }

    #[test]
    fn encode_then_decode_preserves_every_field() {
        let mut event: Event = serde_json::from_str(REGISTRY_PUSH).expect("should decode");
        event.actor.name = "admin".to_string();
        event.target.references.push(Descriptor {
            media_type: "application/vnd.oci.image.layer.v1.tar+gzip".to_string(),
            size: 1024,
            digest: "sha256:abc".to_string(),
            ..Default::default()
        });

        let encoded = serde_json::to_vec(&event).expect("should encode");
        let decoded: Event = serde_json::from_slice(&encoded).expect("should decode");
        assert_eq!(decoded, event);
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let event = Event::new("abc", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), ACTION_PULL);
        let value = serde_json::to_value(&event).expect("should encode");

        assert_eq!(value["target"], serde_json::json!({}));
        assert_eq!(value["source"], serde_json::json!({}));
        assert!(value["timestamp"].as_str().unwrap().starts_with("2024-01-01T00:00:00"));
    }

    const REGISTRY_MOUNT: &str = r#"{
        "id": "9e2a8c1b-4f0d-4a57-9a31-5b8f0c2d7e11",
        "timestamp": "2024-05-01T12:00:00Z",
        "action": "mount",
        "target": {
            "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip",
            "digest": "sha256:a",
            "repository": "team/app",
            "fromRepository": "library/base",
            "urls": ["https://mirror.example.com/blobs/sha256:a"],
            "annotations": {"org.opencontainers.image.title": "layer.tar.gz"}
        }
    }"#;

    #[test]
    fn mount_notification_keeps_source_repository_and_extras() {
        let event: Event = serde_json::from_str(REGISTRY_MOUNT).expect("should decode");
        assert_eq!(event.action, ACTION_MOUNT);
        assert_eq!(event.target.from_repository, "library/base");
        assert_eq!(event.target.urls, vec!["https://mirror.example.com/blobs/sha256:a"]);
        assert_eq!(
            event.target.annotations.get("org.opencontainers.image.title").map(String::as_str),
            Some("layer.tar.gz")
        );

        let encoded = serde_json::to_string(&event).expect("should encode");
        assert!(encoded.contains(r#""fromRepository":"library/base""#), "{encoded}");
        assert!(encoded.contains(r#""urls":["https://mirror.example.com/blobs/sha256:a"]"#));
        assert!(encoded.contains(r#""annotations":{"org.opencontainers.image.title":"layer.tar.gz"}"#));

        let decoded: Event = serde_json::from_str(&encoded).expect("should decode");
        assert_eq!(decoded, event);
    }

    #[test]
    fn envelope_without_events_is_an_empty_batch() {
        let envelope: Envelope = serde_json::from_str(r#"{}"#).expect("should decode");
        assert!(envelope.events.is_empty());
        assert!(serde_json::from_str::<Envelope>(r#"{"events": 3}"#).is_err());
    }
}
