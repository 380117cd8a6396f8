use axum::{
    body::Bytes,
    extract::{ws::Message, Path, State, WebSocketUpgrade},
    Json,
};
use clubhub_api::{
    AuthToken, ClubId, Comment, CommentId, EditComment, Envelope, Error as ApiError, FeedMessage,
    LikeStatus, LikeToggled, NewComment, NewPost, NewSession, NewUser, Post, PostId, User, UserId,
    Uuid,
};
use futures::{SinkExt, StreamExt};

use crate::{extractors::*, feeds, Error};

type Reply<T> = Result<Json<Envelope<T>>, Error>;

fn ok<T>(data: T) -> Reply<T> {
    Ok(Json(Envelope::ok(data)))
}

pub async fn admin_create_user(
    AdminAuth: AdminAuth,
    State(store): State<Store>,
    Json(data): Json<NewUser>,
) -> Reply<User> {
    ok(store.lock().await.admin_create_user(data)?)
}

pub async fn admin_create_post(
    AdminAuth: AdminAuth,
    State(store): State<Store>,
    Json(data): Json<NewPost>,
) -> Reply<Post> {
    ok(store.lock().await.admin_create_post(data)?)
}

pub async fn auth(State(store): State<Store>, Json(data): Json<NewSession>) -> Reply<AuthToken> {
    ok(store.lock().await.auth(data)?)
}

pub async fn unauth(PreAuth(token): PreAuth, State(store): State<Store>) -> Reply<()> {
    ok(store.lock().await.unauth(token)?)
}

pub async fn whoami(auth: Auth) -> Reply<UserId> {
    ok(auth.user)
}

pub async fn fetch_post(
    auth: Auth,
    State(store): State<Store>,
    Path(post): Path<PostId>,
) -> Reply<Post> {
    ok(store.lock().await.fetch_post(auth.token, post)?)
}

pub async fn list_comments(
    auth: Auth,
    State(store): State<Store>,
    Path(post): Path<PostId>,
) -> Reply<Vec<Comment>> {
    ok(store.lock().await.list_comments(auth.token, post)?)
}

/// The post in the path wins over the one in the body
pub async fn create_comment(
    auth: Auth,
    State(store): State<Store>,
    Path(post): Path<PostId>,
    Json(mut data): Json<NewComment>,
) -> Reply<Comment> {
    data.post_id = post;
    ok(store.lock().await.create_comment(auth.token, data)?)
}

pub async fn edit_comment(
    auth: Auth,
    State(store): State<Store>,
    Path(comment): Path<CommentId>,
    Json(data): Json<EditComment>,
) -> Reply<Comment> {
    ok(store.lock().await.edit_comment(auth.token, comment, data)?)
}

pub async fn delete_comment(
    auth: Auth,
    State(store): State<Store>,
    Path(comment): Path<CommentId>,
) -> Reply<()> {
    ok(store.lock().await.delete_comment(auth.token, comment)?)
}

pub async fn toggle_like(
    auth: Auth,
    State(store): State<Store>,
    Path(post): Path<PostId>,
) -> Reply<LikeToggled> {
    ok(store.lock().await.toggle_like(auth.token, post)?)
}

pub async fn like_status(
    auth: Auth,
    State(store): State<Store>,
    Path(post): Path<PostId>,
) -> Reply<LikeStatus> {
    ok(store.lock().await.like_status(auth.token, post)?)
}

/// Rebroadcasts a feed message for clients that do not hold a websocket
pub async fn publish(
    auth: Auth,
    State(store): State<Store>,
    Path(club): Path<ClubId>,
    body: Bytes,
) -> Reply<()> {
    let msg = serde_json::from_slice::<FeedMessage>(&body)
        .map_err(|e| ApiError::MalformedMessage(e.to_string()))?;
    ok(store.lock().await.publish(auth.token, club, msg)?)
}

pub async fn club_feed(
    ws: WebSocketUpgrade,
    State(store): State<Store>,
    Path(club): Path<ClubId>,
) -> axum::response::Response {
    ws.on_upgrade(move |sock| {
        let (write, read) = sock.split();
        club_feed_impl(write, read, store, club)
    })
}

pub async fn club_feed_impl<W, R>(mut write: W, mut read: R, store: Store, club: ClubId)
where
    W: 'static + Send + Unpin + futures::Sink<Message>,
    <W as futures::Sink<Message>>::Error: Send,
    R: 'static + Send + Unpin + futures::Stream<Item = Result<Message, axum::Error>>,
{
    tracing::debug!(?club, "club feed websocket connected");
    if let Some(Ok(Message::Text(token))) = read.next().await {
        if let Ok(token) = Uuid::try_parse(&token) {
            let token = AuthToken(token);
            let receiver = store.lock().await.subscribe(token, club);
            if let Ok(receiver) = receiver {
                if write.send(Message::Text(String::from("ok"))).await.is_ok() {
                    tracing::debug!(?club, "club feed websocket auth success");
                    feeds::relay(store, token, club, receiver, write, read).await;
                    return;
                }
            }
        }
        tracing::debug!(?club, "club feed websocket auth failure");
        let _ = write
            .send(Message::Text(String::from("permission denied")))
            .await;
    }
}
