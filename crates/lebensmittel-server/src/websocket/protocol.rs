//! Wire protocol: one JSON object `{"event": <name>, "data": <payload>}` per text frame.

use axum::extract::ws::Utf8Bytes;
use lebensmittel_core::GroupId;
use serde::Serialize;
use serde_json::Value;

/// Welcome event pushed to every newly registered connection.
pub const CONNECTED_EVENT: &str = "connected";
/// Client request to join more groups.
pub const SUBSCRIBE_EVENT: &str = "subscribe";
/// Client request to have its payload written back; also the reply name.
pub const ECHO_EVENT: &str = "echo";

const WELCOME_MESSAGE: &str = "Connected to Lebensmittel backend";

#[derive(Serialize)]
struct Envelope<'a, T: ?Sized> {
    event: &'a str,
    data: &'a T,
}

/// Serialize an outbound envelope once.
///
/// The returned frame is reference counted, so cloning it per recipient does
/// not copy the payload.
pub fn encode<T: Serialize + ?Sized>(event: &str, data: &T) -> serde_json::Result<Utf8Bytes> {
    let text = serde_json::to_string(&Envelope { event, data })?;
    Ok(Utf8Bytes::from(text))
}

/// The `connected` frame.
pub fn welcome_frame() -> Utf8Bytes {
    Utf8Bytes::from(format!(
        r#"{{"event":"{CONNECTED_EVENT}","data":{{"message":"{WELCOME_MESSAGE}"}}}}"#
    ))
}

/// A decoded client message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Join the listed groups (not yet authorized).
    Subscribe {
        /// Requested ids; non-string entries were skipped.
        groups: Vec<GroupId>,
    },
    /// Write `data` back to the sender.
    Echo(Value),
    /// Any other event name.
    Unknown(String),
}

/// Decode a text frame.
///
/// Returns `Ok(None)` for well-formed JSON that carries nothing to act on: no
/// string `event`, a `subscribe` without a `data.groups` array, or an `echo`
/// without a `data` key.
pub fn decode(text: &str) -> serde_json::Result<Option<Inbound>> {
    let mut msg: Value = serde_json::from_str(text)?;
    let Some(event) = msg.get("event").and_then(Value::as_str).map(str::to_owned) else {
        return Ok(None);
    };

    let inbound = match event.as_str() {
        SUBSCRIBE_EVENT => msg
            .get("data")
            .and_then(|data| data.get("groups"))
            .and_then(Value::as_array)
            .map(|groups| Inbound::Subscribe {
                groups: groups
                    .iter()
                    .filter_map(Value::as_str)
                    .map(GroupId::from)
                    .collect(),
            }),
        ECHO_EVENT => msg
            .as_object_mut()
            .and_then(|obj| obj.remove("data"))
            .map(Inbound::Echo),
        _ => Some(Inbound::Unknown(event)),
    };
    Ok(inbound)
}

/// Split a comma-separated `groups` query value into trimmed, non-empty ids.
pub fn parse_group_list(raw: Option<&str>) -> Vec<GroupId> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(GroupId::from)
            .collect()
    })
    .unwrap_or_default()
}
