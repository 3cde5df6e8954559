use serde::Deserialize;

use crate::broker::Event;

/// JSON body accepted by the publish endpoint.
///
/// An absent or empty `data` publishes the end-of-stream sentinel, which
/// tells every attached subscriber's session to finish.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: String,
}

impl PublishRequest {
    pub fn into_event(self) -> Event {
        Event {
            id: self.id,
            data: self.data,
        }
    }
}
