use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use warp::ws::{Message, WebSocket};

use crate::domain::value_objects::StreamEvent;
use crate::infrastructure::broadcast::Broadcaster;

/// Drive one websocket stream connection for a camera.
///
/// Frames go out as binary messages, metrics as JSON text, in arrival
/// order for this subscriber. The connection is closed (not hung) when
/// the subscriber is evicted or its pipeline stops; reconnecting is the
/// client's responsibility and no history is replayed.
pub async fn handle_stream(socket: WebSocket, camera_id: String, broadcaster: Arc<Broadcaster>) {
    let subscriber = broadcaster.attach(&camera_id);
    let subscriber_id = subscriber.id();

    tracing::info!(camera_id, subscriber_id = %subscriber_id, "Stream client connected");

    let (mut outbound, mut inbound) = socket.split();

    loop {
        tokio::select! {
            event = subscriber.recv() => match event {
                Some(StreamEvent::Frame(frame)) => {
                    if outbound
                        .send(Message::binary(frame.payload.to_vec()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(StreamEvent::Metrics(metrics)) => {
                    match serde_json::to_string(&metrics) {
                        Ok(text) => {
                            if outbound.send(Message::text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to encode metrics message");
                        }
                    }
                }
                // Evicted or detached: end of stream
                None => break,
            },

            message = inbound.next() => match message {
                Some(Ok(message)) if message.is_close() => break,
                // Clients send nothing meaningful on this transport
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
        }
    }

    broadcaster.detach(subscriber_id);
    let _ = outbound.send(Message::close()).await;

    tracing::info!(camera_id, subscriber_id = %subscriber_id, "Stream client disconnected");
}
