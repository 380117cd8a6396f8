use axum::extract::ws::Message;
use clubhub_api::{AuthToken, ClubId, FeedMessage};
use futures::{channel::mpsc, select, SinkExt, StreamExt};

use crate::extractors::Store;

/// Relays the club's feed to an authenticated websocket until either side
/// goes away
///
/// Client frames are either the `ping` keepalive, answered with a `PONG`, or
/// feed messages to rebroadcast to every subscriber of the club.
pub async fn relay<W, R>(
    store: Store,
    token: AuthToken,
    club: ClubId,
    mut receiver: mpsc::UnboundedReceiver<FeedMessage>,
    mut write: W,
    read: R,
) where
    W: 'static + Send + Unpin + futures::Sink<Message>,
    <W as futures::Sink<Message>>::Error: Send,
    R: 'static + Send + Unpin + futures::Stream<Item = Result<Message, axum::Error>>,
{
    let mut read = read.fuse();
    macro_rules! send_message {
        ( $msg:expr ) => {{
            let msg: FeedMessage = $msg;
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!(?err, ?msg, "failed serializing message to json");
                    continue;
                }
            };
            if write.send(Message::Text(json)).await.is_err() {
                tracing::debug!(?club, "club feed websocket went away");
                return;
            }
        }};
    }
    loop {
        select! {
            msg = receiver.next() => match msg {
                None => return,
                Some(msg) => send_message!(msg),
            },
            msg = read.next() => match msg {
                None | Some(Ok(Message::Close(_))) => return,
                Some(Ok(Message::Text(msg))) if msg == "ping" => send_message!(FeedMessage::Pong),
                Some(Ok(Message::Text(msg))) => publish(&store, token, club, msg.as_bytes()).await,
                Some(Ok(Message::Binary(msg))) => publish(&store, token, club, &msg).await,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => (),
                Some(Err(err)) => {
                    tracing::warn!(?err, ?club, "club feed websocket errored");
                    return;
                }
            },
        }
    }
}

async fn publish(store: &Store, token: AuthToken, club: ClubId, frame: &[u8]) {
    let msg = match serde_json::from_slice::<FeedMessage>(frame) {
        Ok(msg) => msg,
        Err(err) => {
            tracing::warn!(?err, ?club, "dropping unparseable client frame");
            return;
        }
    };
    if let Err(err) = store.lock().await.publish(token, club, msg) {
        tracing::warn!(%err, ?club, "refusing to rebroadcast client message");
    }
}
