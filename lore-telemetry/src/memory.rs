use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::{Level, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// A log event captured by [`InMemoryEventLayer`].
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    pub level: String,
    pub target: String,
    pub message: String,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: u128,
    pub fields: HashMap<String, serde_json::Value>,
    /// Names of the enclosing spans, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    pub fn is_level(&self, level: Level) -> bool {
        self.level == level.as_str()
    }
}

/// Shared storage for captured events.
#[derive(Debug, Clone, Default)]
pub struct SharedEventStorage {
    events: Arc<RwLock<Vec<CapturedEvent>>>,
}

impl SharedEventStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events captured so far, in emission order.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.read().map(|events| events.clone()).unwrap_or_default()
    }

    /// Events whose message contains `needle`.
    pub fn find(&self, needle: &str) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.message.contains(needle)).collect()
    }

    /// Events at exactly `level`.
    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.is_level(level)).collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|events| events.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    fn push(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

/// A tracing layer that records every event in memory.
///
/// Install it with [`tracing::subscriber::set_default`] to assert on logs in
/// tests, or alongside the fmt layer via [`crate::init_with_storage`].
pub struct InMemoryEventLayer {
    storage: SharedEventStorage,
}

impl InMemoryEventLayer {
    pub fn new(storage: SharedEventStorage) -> Self {
        Self { storage }
    }
}

impl<S> Layer<S> for InMemoryEventLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.0;

        let message = match fields.remove("message") {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let spans = ctx
            .event_scope(event)
            .map(|scope| scope.from_root().map(|span| span.name().to_string()).collect())
            .unwrap_or_default();

        let metadata = event.metadata();
        self.storage.push(CapturedEvent {
            level: metadata.level().as_str().to_string(),
            target: metadata.target().to_string(),
            message,
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
            fields,
            spans,
        });
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn capture<F: FnOnce()>(f: F) -> SharedEventStorage {
        let storage = SharedEventStorage::new();
        let subscriber =
            tracing_subscriber::registry().with(InMemoryEventLayer::new(storage.clone()));
        tracing::subscriber::with_default(subscriber, f);
        storage
    }

    #[test]
    fn captures_message_level_and_fields() {
        let storage = capture(|| {
            tracing::warn!(chunk_count = 3u64, provider = "mock", ok = true, "indexing slow");
        });

        let events = storage.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.message, "indexing slow");
        assert!(event.is_level(Level::WARN));
        assert_eq!(event.field("chunk_count"), Some(&serde_json::json!(3)));
        assert_eq!(event.field("provider"), Some(&serde_json::json!("mock")));
        assert_eq!(event.field("ok"), Some(&serde_json::json!(true)));
        assert!(event.field("message").is_none());
        assert!(event.timestamp > 0);
    }

    #[test]
    fn records_enclosing_spans_outermost_first() {
        let storage = capture(|| {
            let outer = tracing::info_span!("request");
            let _outer = outer.enter();
            let inner = tracing::info_span!("embed");
            let _inner = inner.enter();
            tracing::info!("batch sent");
        });

        assert_eq!(storage.events()[0].spans, vec!["request".to_string(), "embed".to_string()]);
    }

    #[test]
    fn find_and_filter_by_level() {
        let storage = capture(|| {
            tracing::info!("indexed document");
            tracing::error!("embedding failed during indexing");
            tracing::error!("retrieve_and_query failed");
        });

        assert_eq!(storage.find("indexing").len(), 1);
        assert_eq!(storage.at_level(Level::ERROR).len(), 2);
        assert_eq!(storage.len(), 3);

        storage.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn captured_event_serializes_without_empty_spans() {
        let storage = capture(|| tracing::info!(score = 0.5f64, "retrieval completed"));
        let json = serde_json::to_value(&storage.events()[0]).unwrap();
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["fields"]["score"], 0.5);
        assert!(json.get("spans").is_none());
    }
}
