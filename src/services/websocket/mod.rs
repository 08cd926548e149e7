//! WebSocket delivery endpoints
//!
//! Each accepted socket is registered in the [`ConnectionRegistry`] with a
//! bounded outbound queue. A writer task drains the queue into the socket
//! while the session loop applies control messages from the client.

pub mod protocol;
pub mod registry;

pub use protocol::{ClientCommand, PING, PONG};
pub use registry::{
    ConnectionRegistry, DeliveryError, DeliveryReport, EndpointId, EndpointSink,
    SubscriptionFilter,
};

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::events::ServerEvent;

/// Close reason sent to an endpoint the registry dropped
pub const EVICTED_REASON: &str = "endpoint evicted";

/// Apply a client command to the registry and queue the reply for the endpoint
pub fn apply_command(
    registry: &ConnectionRegistry,
    id: EndpointId,
    command: ClientCommand,
) -> Result<(), DeliveryError> {
    let reply = match command {
        ClientCommand::Ping => return registry.send_to(id, PONG),
        ClientCommand::Subscribe(symbols) => {
            registry.set_filter(id, SubscriptionFilter::symbols(symbols.iter().cloned()));
            ServerEvent::subscribed_symbols(symbols)
        }
        ClientCommand::SubscribeAdd(symbol) => {
            registry.add_symbol(id, &symbol);
            ServerEvent::subscribed_symbol(symbol)
        }
        ClientCommand::SubscribeAll => {
            registry.set_filter(id, SubscriptionFilter::All);
            ServerEvent::subscribed_all()
        }
    };

    match reply.to_json() {
        Ok(json) => registry.send_to(id, &json),
        Err(e) => {
            warn!(endpoint_id = id, error = %e, "WebSocket session: failed to encode reply");
            Ok(())
        }
    }
}

/// Drive one client connection until either side closes it
///
/// When the registry evicts the endpoint its queue closes, the writer sends a
/// Close frame and the session ends.
pub async fn run_session(socket: WebSocket, registry: Arc<ConnectionRegistry>, buffer: usize) {
    let (id, mut outbound) = registry.register_channel(buffer);
    let (mut sender, mut receiver) = socket.split();
    info!(endpoint_id = id, "WebSocket session: endpoint {} connected", id);

    let mut writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if sender.send(Message::Text(payload.into())).await.is_err() {
                return;
            }
        }

        let close = CloseFrame {
            code: close_code::AGAIN,
            reason: EVICTED_REASON.into(),
        };
        let _ = sender.send(Message::Close(Some(close))).await;
    });

    loop {
        tokio::select! {
            _ = &mut writer => {
                debug!(endpoint_id = id, "WebSocket session: writer finished, closing endpoint {}", id);
                break;
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let Some(command) = ClientCommand::parse(text.as_str()) else {
                        debug!(endpoint_id = id, "WebSocket session: ignoring unrecognized message");
                        continue;
                    };
                    if let Err(e) = apply_command(&registry, id, command) {
                        debug!(endpoint_id = id, error = %e, "WebSocket session: reply failed");
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    registry.unregister(id);
    writer.abort();
    info!(endpoint_id = id, "WebSocket session: endpoint {} disconnected", id);
}
