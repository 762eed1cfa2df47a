use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use stock_core::PublishedSnapshot;

use crate::state::{AppState, StockEvent};

pub async fn stock_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_snapshots(socket, state))
}

/// Sends the current snapshot, then every newly published one. A slow
/// reader skips straight to the latest value.
async fn stream_snapshots(mut socket: WebSocket, state: AppState) {
    let mut snapshots = state.subscribe_snapshots();

    let current = snapshots.borrow_and_update().clone();
    if let Some(published) = current {
        if send_snapshot(&mut socket, &published).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => return,
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return;
                }
                let latest = snapshots.borrow_and_update().clone();
                if let Some(published) = latest {
                    if send_snapshot(&mut socket, &published).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

async fn send_snapshot(
    socket: &mut WebSocket,
    published: &Arc<PublishedSnapshot>,
) -> Result<(), ()> {
    let payload = event_json(&StockEvent::Snapshot(published.snapshot.clone()))?;
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}

fn event_json(event: &StockEvent) -> Result<String, ()> {
    serde_json::to_string(event).map_err(|_| ())
}
