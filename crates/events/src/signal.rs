//! Messages that tell a tab its catalog may be out of date.

use serde::{Deserialize, Serialize};

use storefront_core::{Product, TabId};

/// Payload-free discriminant of a [`ChangeSignal`], used for coalescing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    ExternalStorage,
    EditorEvent,
    PollTick,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::ExternalStorage => "external-storage",
            SignalKind::EditorEvent => "editor-event",
            SignalKind::PollTick => "poll-tick",
        }
    }
}

impl core::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change notification waiting to be dispatched.
///
/// Created by a listener, consumed exactly once by the dispatcher, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChangeSignal {
    /// Another tab wrote the catalog key of the shared cache.
    ExternalStorage,
    /// The admin editor changed the catalog in this tab. `payload` is the full
    /// updated list when the editor sent one.
    EditorEvent { payload: Option<Vec<Product>> },
    /// The freshness timer fired.
    PollTick,
}

impl ChangeSignal {
    pub fn kind(&self) -> SignalKind {
        match self {
            ChangeSignal::ExternalStorage => SignalKind::ExternalStorage,
            ChangeSignal::EditorEvent { .. } => SignalKind::EditorEvent,
            ChangeSignal::PollTick => SignalKind::PollTick,
        }
    }
}

/// Messages that remember which tab produced them.
pub trait Originated {
    fn origin(&self) -> TabId;
}

/// "Storage changed": published by the browser profile after every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    pub key: String,
    pub origin: TabId,
}

impl Originated for StorageEvent {
    fn origin(&self) -> TabId {
        self.origin
    }
}

impl StorageEvent {
    /// Whether a tab should react: a write by someone else, to the watched key.
    pub fn concerns(&self, tab: TabId, key: &str) -> bool {
        self.origin != tab && self.key == key
    }
}

/// In-tab broadcast from the admin editor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditorAnnouncement {
    pub products: Option<Vec<Product>>,
}

impl EditorAnnouncement {
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: Some(products),
        }
    }

    /// Announcement without a payload: listeners must reload on their own.
    pub fn reload() -> Self {
        Self { products: None }
    }
}

impl From<EditorAnnouncement> for ChangeSignal {
    fn from(value: EditorAnnouncement) -> Self {
        ChangeSignal::EditorEvent {
            payload: value.products,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signals_serialize_with_kind_tag() {
        let v = serde_json::to_value(ChangeSignal::PollTick).unwrap();
        assert_eq!(v, json!({"kind": "poll-tick"}));

        let v = serde_json::to_value(ChangeSignal::EditorEvent { payload: None }).unwrap();
        assert_eq!(v, json!({"kind": "editor-event", "payload": null}));
    }

    #[test]
    fn kind_ignores_payload() {
        let a = ChangeSignal::EditorEvent { payload: None };
        let b = ChangeSignal::EditorEvent {
            payload: Some(vec![Product::new("p1", "x", 1.0)]),
        };
        assert_eq!(a.kind(), b.kind());
        assert_ne!(a.kind(), ChangeSignal::ExternalStorage.kind());
    }

    #[test]
    fn own_writes_and_other_keys_do_not_concern_a_tab() {
        let me = TabId::new();
        let other = TabId::new();
        let key = "storefront.catalog";

        let own = StorageEvent { key: key.into(), origin: me };
        let foreign = StorageEvent { key: key.into(), origin: other };
        let unrelated = StorageEvent { key: "cart".into(), origin: other };

        assert!(!own.concerns(me, key));
        assert!(foreign.concerns(me, key));
        assert!(!unrelated.concerns(me, key));
    }
}
