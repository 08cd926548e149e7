//! Client control messages accepted on an endpoint

use serde::Deserialize;
use serde_json::Value;

/// Literal keepalive request and its reply (sent outside the JSON envelope)
pub const PING: &str = "ping";
pub const PONG: &str = "pong";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Ping,
    Subscribe(Vec<String>),
    SubscribeAdd(String),
    SubscribeAll,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ControlMessage {
    Subscribe {
        #[serde(default)]
        symbols: Value,
    },
    SubscribeAdd {
        #[serde(default)]
        symbol: Value,
    },
    SubscribeAll,
}

impl ClientCommand {
    /// Parse one text frame. Unknown actions, malformed JSON, an empty symbol
    /// list or an empty symbol yield `None` and are ignored by the session.
    pub fn parse(text: &str) -> Option<Self> {
        if text == PING {
            return Some(ClientCommand::Ping);
        }

        match serde_json::from_str::<ControlMessage>(text).ok()? {
            ControlMessage::Subscribe { symbols } => {
                let symbols: Vec<String> = symbols
                    .as_array()?
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                (!symbols.is_empty()).then_some(ClientCommand::Subscribe(symbols))
            }
            ControlMessage::SubscribeAdd { symbol } => {
                let symbol = symbol.as_str().filter(|s| !s.is_empty())?;
                Some(ClientCommand::SubscribeAdd(symbol.to_string()))
            }
            ControlMessage::SubscribeAll => Some(ClientCommand::SubscribeAll),
        }
    }
}
