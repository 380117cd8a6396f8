#![cfg(test)]

use std::{sync::Arc, time::Duration};

use clubhub_client::{
    api::{
        AuthToken, ClubId, CommentId, NewComment, NewPost, NewSession, NewUser, PostId, UserId,
    },
    driver, NoticeLevel, PostMsg, PostView,
};
use futures::{channel::mpsc, StreamExt};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{MockBackend, MockServer};

const CLUB: ClubId = ClubId(1);

#[derive(Debug)]
struct Snapshot {
    loaded: bool,
    comments: Vec<(CommentId, String)>,
    like_count: u64,
    is_liked: bool,
    num_notices: usize,
}

impl Snapshot {
    fn of(v: &PostView) -> Snapshot {
        Snapshot {
            loaded: !v.is_loading(),
            comments: v.tree().iter().map(|c| (c.id, c.content.clone())).collect(),
            like_count: v.likes().like_count,
            is_liked: v.likes().is_liked,
            num_notices: v.notices().len(),
        }
    }

    fn contents(&self) -> Vec<&str> {
        self.comments.iter().map(|(_, c)| c as &str).collect()
    }
}

/// One user looking at the post through a driven `PostView`
struct Client {
    msgs: mpsc::UnboundedSender<PostMsg>,
    snapshots: mpsc::UnboundedReceiver<Snapshot>,
    driver: JoinHandle<PostView>,
}

impl Client {
    async fn open(server: &Arc<Mutex<MockServer>>, token: AuthToken, post: PostId) -> Client {
        let backend = Arc::new(MockBackend {
            server: server.clone(),
            token,
            club: CLUB,
        });
        let user = server.lock().await.whoami(token).unwrap();
        let feed = server
            .lock()
            .await
            .subscribe(token, CLUB)
            .unwrap()
            .map(|m| serde_json::to_vec(&m).unwrap());
        let (msgs, user_msgs) = mpsc::unbounded();
        let (snap_tx, snapshots) = mpsc::unbounded();
        let view = PostView::new(post, server.lock().await.num_likes(post), Arc::new(user));
        let driver = tokio::spawn(driver::run(
            view,
            backend.clone(),
            backend,
            feed,
            user_msgs,
            move |v: &PostView| {
                let _ = snap_tx.unbounded_send(Snapshot::of(v));
            },
        ));
        let mut c = Client {
            msgs,
            snapshots,
            driver,
        };
        c.wait_for(|s| s.loaded).await;
        c
    }

    fn send(&self, msg: PostMsg) {
        self.msgs.unbounded_send(msg).unwrap();
    }

    async fn wait_for(&mut self, pred: impl Fn(&Snapshot) -> bool) -> Snapshot {
        let snapshots = &mut self.snapshots;
        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(s) = snapshots.next().await {
                if pred(&s) {
                    return s;
                }
            }
            panic!("driver stopped rendering");
        })
        .await
        .expect("timed out waiting for the view")
    }

    async fn close(self) -> PostView {
        drop(self.msgs);
        self.driver.await.unwrap()
    }
}

struct Setup {
    server: Arc<Mutex<MockServer>>,
    alice: (UserId, AuthToken),
    bob: (UserId, AuthToken),
    post: PostId,
}

async fn setup() -> Setup {
    let mut server = MockServer::new();
    let mut users = Vec::new();
    for name in ["alice", "bob"] {
        let u = server
            .admin_create_user(NewUser {
                name: String::from(name),
                password: String::from("hunter2"),
                avatar: None,
            })
            .unwrap();
        let tok = server
            .auth(NewSession::new(String::from(name), String::from("hunter2")))
            .unwrap();
        users.push((u.id, tok));
    }
    let post = server
        .admin_create_post(NewPost {
            club_id: CLUB,
            author_id: users[0].0,
            content: String::from("meeting on friday"),
        })
        .unwrap()
        .id;
    Setup {
        server: Arc::new(Mutex::new(server)),
        alice: users[0],
        bob: users[1],
        post,
    }
}

async fn create_root(s: &Setup, content: &str) -> CommentId {
    s.server
        .lock()
        .await
        .create_comment(
            s.alice.1,
            NewComment {
                post_id: s.post,
                author_id: s.alice.0,
                content: String::from(content),
                parent_id: None,
            },
        )
        .unwrap()
        .id
}

#[tokio::test]
async fn created_comments_arrive_through_the_echo() {
    let s = setup().await;
    let mut alice = Client::open(&s.server, s.alice.1, s.post).await;
    let mut bob = Client::open(&s.server, s.bob.1, s.post).await;

    alice.send(PostMsg::SetDraft(String::from("  see you there  ")));
    alice.send(PostMsg::SubmitComment);
    let snap = alice.wait_for(|s| !s.comments.is_empty()).await;
    assert_eq!(snap.contents(), vec!["see you there"]);
    let snap = bob.wait_for(|s| !s.comments.is_empty()).await;
    assert_eq!(snap.contents(), vec!["see you there"]);

    let view = alice.close().await;
    assert_eq!(view.tree().len(), 1);
    assert_eq!(view.draft(), "");
    bob.close().await;
}

#[tokio::test]
async fn edits_reach_other_views_through_the_rebroadcast() {
    let s = setup().await;
    let id = create_root(&s, "at 6pm").await;
    let mut alice = Client::open(&s.server, s.alice.1, s.post).await;
    let mut bob = Client::open(&s.server, s.bob.1, s.post).await;

    alice.send(PostMsg::StartEdit(id));
    alice.send(PostMsg::SetEditDraft(String::from("at 7pm")));
    alice.send(PostMsg::SubmitEdit);
    bob.wait_for(|s| s.contents() == vec!["at 7pm"]).await;
    alice.wait_for(|s| s.contents() == vec!["at 7pm"]).await;

    let view = bob.close().await;
    assert!(view.tree().find(id).unwrap().edited);
    let view = alice.close().await;
    assert!(view.editor().is_none());
}

#[tokio::test]
async fn replies_and_cascading_deletes_propagate() {
    let s = setup().await;
    let root = create_root(&s, "who brings snacks?").await;
    let mut alice = Client::open(&s.server, s.alice.1, s.post).await;
    let mut bob = Client::open(&s.server, s.bob.1, s.post).await;

    bob.send(PostMsg::OpenReply(root));
    bob.send(PostMsg::SetReplyDraft(String::from("me")));
    bob.send(PostMsg::SubmitReply);
    let snap = alice.wait_for(|s| s.comments.len() == 2).await;
    assert_eq!(snap.contents(), vec!["who brings snacks?", "me"]);
    let reply = snap.comments[1].0;

    // bob answers his own reply, which lands in the same bucket
    bob.wait_for(|s| s.comments.len() == 2).await;
    bob.send(PostMsg::OpenReply(reply));
    bob.send(PostMsg::SetReplyDraft(String::from("chips")));
    bob.send(PostMsg::SubmitReply);
    alice.wait_for(|s| s.comments.len() == 3).await;

    alice.send(PostMsg::RequestDelete(root));
    alice.send(PostMsg::ConfirmDelete);
    bob.wait_for(|s| s.comments.is_empty()).await;
    alice.wait_for(|s| s.comments.is_empty()).await;
    assert!(s
        .server
        .lock()
        .await
        .list_comments(s.bob.1, s.post)
        .unwrap()
        .is_empty());

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn like_updates_reach_every_view() {
    let s = setup().await;
    let mut alice = Client::open(&s.server, s.alice.1, s.post).await;
    let mut bob = Client::open(&s.server, s.bob.1, s.post).await;

    alice.send(PostMsg::ToggleLike);
    alice
        .wait_for(|s| s.is_liked && s.like_count == 1)
        .await;
    let snap = bob.wait_for(|s| s.like_count == 1).await;
    assert!(!snap.is_liked);

    bob.send(PostMsg::ToggleLike);
    alice.wait_for(|s| s.is_liked && s.like_count == 2).await;
    bob.wait_for(|s| s.is_liked && s.like_count == 2).await;

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn other_users_comments_cannot_be_edited() {
    let s = setup().await;
    let id = create_root(&s, "mine").await;
    let mut bob = Client::open(&s.server, s.bob.1, s.post).await;
    bob.send(PostMsg::StartEdit(id));
    bob.send(PostMsg::SubmitEdit);
    bob.wait_for(|s| s.num_notices == 1).await;
    // nothing stops asking for the delete, the backend refuses it
    bob.send(PostMsg::RequestDelete(id));
    bob.send(PostMsg::ConfirmDelete);
    bob.wait_for(|s| s.num_notices == 2).await;
    let mut view = bob.close().await;
    assert!(view.editor().is_none());
    assert!(view.tree().contains(id));
    let notices = view.take_notices();
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert_eq!(notices[1].level, NoticeLevel::Error);
}
