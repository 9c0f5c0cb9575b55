/// Event properties sent to an [`EventSink`].
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Name of the event emitted when an identity is exposed to an experiment.
pub const TRIGGER_EVENT_NAME: &str = "$ABTestTrigger";

/// Receives trigger events. Implement it to forward events to your analytics pipeline.
///
/// Any `Fn(&str, bool, &str, &Properties)` closure is an `EventSink`.
pub trait EventSink {
    /// Record `event_name` for `distinct_id`.
    fn track(&self, distinct_id: &str, is_login_id: bool, event_name: &str, properties: &Properties);
}

impl<T: Fn(&str, bool, &str, &Properties)> EventSink for T {
    fn track(&self, distinct_id: &str, is_login_id: bool, event_name: &str, properties: &Properties) {
        self(distinct_id, is_login_id, event_name, properties);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::{EventSink, Properties};

    /// One recorded `track` call.
    #[derive(Debug, Clone, PartialEq)]
    pub struct TrackedEvent {
        pub distinct_id: String,
        pub is_login_id: bool,
        pub event_name: String,
        pub properties: Properties,
    }

    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<TrackedEvent>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<TrackedEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn track(
            &self,
            distinct_id: &str,
            is_login_id: bool,
            event_name: &str,
            properties: &Properties,
        ) {
            self.events.lock().unwrap().push(TrackedEvent {
                distinct_id: distinct_id.to_owned(),
                is_login_id,
                event_name: event_name.to_owned(),
                properties: properties.clone(),
            });
        }
    }
}
