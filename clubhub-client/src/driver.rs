//! Event loop of a post view
//!
//! User messages, backend answers and push-channel frames all end up as
//! `PostMsg`s applied one after the other to the same `PostView`, so no two
//! updates ever overlap.

use std::sync::Arc;

use futures::{future::BoxFuture, select, stream::FuturesUnordered, FutureExt, Stream, StreamExt};

use crate::{api::FeedMessage, Backend, Effect, PostMsg, PostView, PushChannel};

impl Effect {
    /// Runs the request, returning the message carrying its answer if any
    pub async fn run<B, C>(self, backend: &B, channel: &C) -> Option<PostMsg>
    where
        B: Backend + ?Sized,
        C: PushChannel + ?Sized,
    {
        Some(match self {
            Effect::FetchComments(p) => PostMsg::CommentsLoaded(backend.list_comments(p).await),
            Effect::FetchLikeStatus(p) => PostMsg::LikeStatusLoaded(backend.like_status(p).await),
            Effect::CreateComment(c) => PostMsg::CommentCreated(backend.create_comment(c).await),
            Effect::EditComment(id, e) => {
                PostMsg::CommentEdited(id, backend.edit_comment(id, e).await)
            }
            Effect::DeleteComment(id) => {
                PostMsg::CommentDeleted(id, backend.delete_comment(id).await)
            }
            Effect::ToggleLike(p) => PostMsg::LikeToggled(backend.toggle_like(p).await),
            Effect::Broadcast(msg) => {
                if let Err(err) = channel.send(msg).await {
                    tracing::error!(?err, "failed publishing on push channel");
                }
                return None;
            }
        })
    }
}

type InFlight = FuturesUnordered<BoxFuture<'static, Option<PostMsg>>>;

fn start<B, C>(effects: Vec<Effect>, backend: &Arc<B>, channel: &Arc<C>, in_flight: &mut InFlight)
where
    B: 'static + Backend + ?Sized,
    C: 'static + PushChannel + ?Sized,
{
    for e in effects {
        tracing::trace!(effect = ?e, "starting request");
        let backend = backend.clone();
        let channel = channel.clone();
        in_flight.push(async move { e.run(&*backend, &*channel).await }.boxed());
    }
}

/// Drives `view` until the `user` stream ends, which is how the owner of the
/// view tears it down
///
/// `feed` carries the raw frames of the club's push channel; frames that do
/// not parse are logged and dropped. `render` is called after every update.
/// Requests still in flight at teardown are dropped without effect.
pub async fn run<B, C, F, U, R>(
    mut view: PostView,
    backend: Arc<B>,
    channel: Arc<C>,
    feed: F,
    user: U,
    mut render: R,
) -> PostView
where
    B: 'static + Backend + ?Sized,
    C: 'static + PushChannel + ?Sized,
    F: Stream<Item = Vec<u8>> + Unpin,
    U: Stream<Item = PostMsg> + Unpin,
    R: FnMut(&PostView),
{
    let mut in_flight = InFlight::new();
    let mut feed = feed.fuse();
    let mut user = user.fuse();

    start(view.init(), &backend, &channel, &mut in_flight);
    render(&view);

    loop {
        let msg = select! {
            msg = user.next() => match msg {
                None => break,
                Some(msg) => msg,
            },
            msg = in_flight.select_next_some() => match msg {
                None => continue,
                Some(msg) => msg,
            },
            frame = feed.next() => match frame {
                None => {
                    tracing::warn!(post = ?view.post_id(), "push channel closed");
                    continue;
                }
                Some(frame) => match serde_json::from_slice::<FeedMessage>(&frame) {
                    Err(err) => {
                        tracing::warn!(?err, "dropping unparseable push channel frame");
                        continue;
                    }
                    Ok(FeedMessage::Pong) => continue,
                    Ok(FeedMessage::Post(e)) => PostMsg::Feed(e),
                },
            },
            complete => break,
        };
        let effects = view.update(msg);
        start(effects, &backend, &channel, &mut in_flight);
        render(&view);
    }

    tracing::debug!(
        post = ?view.post_id(),
        num_in_flight = in_flight.len(),
        "post view torn down"
    );
    view
}
