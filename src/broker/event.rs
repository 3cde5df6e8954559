/// A single unit of data published to a topic.
///
/// An event carries an optional identifier and a payload string, and is
/// immutable once constructed. An event with an empty payload is the
/// end-of-stream sentinel: delivering one tells a subscriber's consumer to
/// stop reading and tear the connection down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: Option<String>,
    pub data: String,
}

impl Event {
    /// Creates an event with a payload and no identifier.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            id: None,
            data: data.into(),
        }
    }

    /// Creates an event with both an identifier and a payload.
    pub fn with_id(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            data: data.into(),
        }
    }

    /// Creates the end-of-stream sentinel event.
    pub fn end_of_stream() -> Self {
        Self::new("")
    }

    /// Whether this event is the end-of-stream sentinel.
    pub fn is_end_of_stream(&self) -> bool {
        self.data.is_empty()
    }

    /// Renders the event as an SSE wire record:
    ///
    /// ```text
    /// id: <id>\n        (only when id is present and non-empty)
    /// data: <data>\n
    /// \n
    /// ```
    ///
    /// Embedded newlines in `data` are not escaped; the protocol delimits
    /// records by a blank line, so producers must pre-encode payloads that
    /// contain them.
    pub fn format(&self) -> String {
        let mut record = String::new();
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            record.push_str("id: ");
            record.push_str(id);
            record.push('\n');
        }
        record.push_str("data: ");
        record.push_str(&self.data);
        record.push_str("\n\n");
        record
    }
}
