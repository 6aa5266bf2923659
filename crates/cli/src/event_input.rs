//! Wire shape for a single `(resourceName, operation, data, id,
//! beforeData?)` event read from a config/event JSON document
//! (`EventTuple` itself carries no `Deserialize` impl — it's an internal
//! core type, not a wire format).

use model::{core::value::DataMap, event::EventTuple, event::Operation};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub resource_name: String,
    pub operation: Operation,
    pub data: DataMap,
    pub id: String,
    #[serde(default)]
    pub before_data: Option<DataMap>,
    #[serde(default)]
    pub metadata: Option<DataMap>,
}

impl From<EventInput> for EventTuple {
    fn from(input: EventInput) -> Self {
        let mut event = EventTuple::new(input.resource_name, input.operation, input.data, input.id);
        event.before_data = input.before_data;
        event.metadata = input.metadata;
        event
    }
}
