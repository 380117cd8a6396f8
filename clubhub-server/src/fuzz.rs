#![cfg(test)]

use std::{cmp, fmt::Debug, ops::RangeTo, panic::AssertUnwindSafe, sync::Arc};

use axum::{
    http::{self, request, StatusCode},
    Router,
};
use clubhub_api::{
    AuthToken, ClubId, Comment, CommentId, EditComment, Envelope, Error as ApiError, FeedMessage,
    LikeStatus, LikeToggled, NewComment, NewPost, NewSession, NewUser, Post, PostEvent, PostId,
    User, UserId, Uuid,
};
use bolero::generator::TypeGenerator;
use futures::StreamExt;
use clubhub_mock_server::MockServer;
use tokio::sync::Mutex;
use tower::{Service, ServiceExt};

use crate::app;

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

async fn call<Resp>(app: &mut Router, req: request::Request<axum::body::Body>) -> Result<Resp, ApiError>
where
    Resp: 'static + for<'de> serde::Deserialize<'de>,
{
    app.ready().await.expect("waiting for app to be ready");
    let resp = app.call(req).await.expect("running request");
    let status = resp.status();
    let body = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("recovering resp bytes");
    if status != StatusCode::OK {
        let err = ApiError::parse(&body)
            .unwrap_or_else(|err| panic!("parsing error response body {err}, body is {body:?}"));
        assert_eq!(status, err.status_code(), "status code does not match {err:?}");
        return Err(err);
    }
    let envelope: Envelope<Resp> = serde_json::from_slice(&body)
        .unwrap_or_else(|err| panic!("failed parsing envelope {err}, body is {body:?}"));
    if std::any::TypeId::of::<Resp>() == std::any::TypeId::of::<()>() {
        envelope.into_unit()?;
        // `data` is `null` for unit answers, which serde reads as `None`
        return Ok(serde_json::from_slice(b"null").unwrap());
    }
    envelope.into_result()
}

async fn run_on_app<Req, Resp>(
    app: &mut Router,
    method: &str,
    uri: &str,
    token: Option<Uuid>,
    body: Option<&Req>,
) -> Result<Resp, ApiError>
where
    Req: Debug + serde::Serialize,
    Resp: 'static + for<'de> serde::Deserialize<'de>,
{
    let req = request::Builder::new()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    let req = match token {
        Some(token) => req.header(http::header::AUTHORIZATION, format!("bearer {token}")),
        None => req,
    };
    let body = match body {
        Some(body) => {
            axum::body::Body::from(serde_json::to_vec(body).expect("serializing request body"))
        }
        None => axum::body::Body::empty(),
    };
    call(app, req.body(body).expect("building request")).await
}

const CLUB: ClubId = ClubId(1);

fn new_app() -> (Router, Uuid) {
    let admin_token = Uuid::new_v4();
    let app = app(
        Arc::new(Mutex::new(MockServer::new())),
        Some(AuthToken(admin_token)),
    );
    (app, admin_token)
}

async fn login(app: &mut Router, admin: Uuid, name: &str) -> (UserId, Uuid) {
    let user: User = run_on_app(
        app,
        "POST",
        "/api/admin/create-user",
        Some(admin),
        Some(&NewUser {
            name: String::from(name),
            password: String::from("secret"),
            avatar: None,
        }),
    )
    .await
    .expect("creating user");
    let tok: AuthToken = run_on_app(
        app,
        "POST",
        "/api/auth",
        None,
        Some(&NewSession::new(String::from(name), String::from("secret"))),
    )
    .await
    .expect("logging in");
    (user.id, tok.0)
}

async fn create_post(app: &mut Router, admin: Uuid, author: UserId) -> PostId {
    let post: Post = run_on_app(
        app,
        "POST",
        "/api/admin/create-post",
        Some(admin),
        Some(&NewPost {
            club_id: CLUB,
            author_id: author,
            content: String::from("bake sale next week"),
        }),
    )
    .await
    .expect("creating post");
    post.id
}

async fn comment(
    app: &mut Router,
    who: (UserId, Uuid),
    post: PostId,
    parent: Option<CommentId>,
) -> Result<Comment, ApiError> {
    run_on_app(
        app,
        "POST",
        &format!("/api/posts/{}/comments", post.0),
        Some(who.1),
        Some(&NewComment {
            post_id: post,
            author_id: who.0,
            content: String::from("I'll bring cookies"),
            parent_id: parent,
        }),
    )
    .await
}

#[tokio::test]
async fn routes_answer_with_envelopes() {
    let (mut app, admin) = new_app();
    let alice = login(&mut app, admin, "alice").await;
    let post = create_post(&mut app, admin, alice.0).await;

    let me: UserId = run_on_app::<(), _>(&mut app, "GET", "/api/whoami", Some(alice.1), None)
        .await
        .unwrap();
    assert_eq!(me, alice.0);

    let root = comment(&mut app, alice, post, None).await.unwrap();
    let reply = comment(&mut app, alice, post, Some(root.id)).await.unwrap();
    assert_eq!(reply.root_parent_id, Some(root.id));

    let listed: Vec<Comment> = run_on_app::<(), _>(
        &mut app,
        "GET",
        &format!("/api/posts/{}/comments", post.0),
        Some(alice.1),
        None,
    )
    .await
    .unwrap();
    assert_eq!(
        listed.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![root.id, reply.id]
    );

    let edited: Comment = run_on_app(
        &mut app,
        "PUT",
        &format!("/api/comments/{}", reply.id.0),
        Some(alice.1),
        Some(&EditComment {
            content: String::from("and brownies"),
        }),
    )
    .await
    .unwrap();
    assert!(edited.edited);
    assert_eq!(edited.content, "and brownies");

    let liked: LikeToggled = run_on_app::<(), _>(
        &mut app,
        "POST",
        &format!("/api/posts/{}/like", post.0),
        Some(alice.1),
        None,
    )
    .await
    .unwrap();
    assert_eq!(
        liked,
        LikeToggled {
            liked: true,
            count: 1
        }
    );
    let status: LikeStatus = run_on_app::<(), _>(
        &mut app,
        "GET",
        &format!("/api/posts/{}/like", post.0),
        Some(alice.1),
        None,
    )
    .await
    .unwrap();
    assert!(status.liked);

    let () = run_on_app::<(), _>(
        &mut app,
        "DELETE",
        &format!("/api/comments/{}", root.id.0),
        Some(alice.1),
        None,
    )
    .await
    .unwrap();
    let listed: Vec<Comment> = run_on_app::<(), _>(
        &mut app,
        "GET",
        &format!("/api/posts/{}/comments", post.0),
        Some(alice.1),
        None,
    )
    .await
    .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let (mut app, admin) = new_app();
    let alice = login(&mut app, admin, "alice").await;
    let bob = login(&mut app, admin, "bob").await;
    let post = create_post(&mut app, admin, alice.0).await;
    let root = comment(&mut app, alice, post, None).await.unwrap();

    assert_eq!(
        run_on_app::<(), UserId>(&mut app, "GET", "/api/whoami", None, None).await,
        Err(ApiError::PermissionDenied)
    );
    assert_eq!(
        run_on_app::<(), UserId>(&mut app, "GET", "/api/whoami", Some(Uuid::new_v4()), None)
            .await,
        Err(ApiError::PermissionDenied)
    );
    assert_eq!(
        comment(&mut app, alice, PostId(999), None).await,
        Err(ApiError::PostNotFound(PostId(999)))
    );
    assert_eq!(
        comment(&mut app, alice, post, Some(CommentId(999))).await,
        Err(ApiError::ParentNotFound(CommentId(999)))
    );
    assert_eq!(
        run_on_app::<(), ()>(
            &mut app,
            "DELETE",
            &format!("/api/comments/{}", root.id.0),
            Some(bob.1),
            None,
        )
        .await,
        Err(ApiError::PermissionDenied)
    );
    assert_eq!(
        run_on_app::<_, Comment>(
            &mut app,
            "PUT",
            &format!("/api/comments/{}", root.id.0),
            Some(alice.1),
            Some(&EditComment {
                content: String::from(" "),
            }),
        )
        .await,
        Err(ApiError::EmptyContent)
    );
    assert_eq!(
        run_on_app::<_, User>(
            &mut app,
            "POST",
            "/api/admin/create-user",
            Some(alice.1),
            Some(&NewUser {
                name: String::from("mallory"),
                password: String::new(),
                avatar: None,
            }),
        )
        .await,
        Err(ApiError::PermissionDenied)
    );
    assert_eq!(
        run_on_app::<_, User>(
            &mut app,
            "POST",
            "/api/admin/create-user",
            Some(admin),
            Some(&NewUser {
                name: String::from("bob"),
                password: String::new(),
                avatar: None,
            }),
        )
        .await,
        Err(ApiError::NameAlreadyUsed(String::from("bob")))
    );
}

#[tokio::test]
async fn logged_out_sessions_are_refused() {
    let (mut app, admin) = new_app();
    let alice = login(&mut app, admin, "alice").await;
    let () = run_on_app::<(), _>(&mut app, "POST", "/api/unauth", Some(alice.1), None)
        .await
        .unwrap();
    assert_eq!(
        run_on_app::<(), UserId>(&mut app, "GET", "/api/whoami", Some(alice.1), None).await,
        Err(ApiError::PermissionDenied)
    );
}

#[tokio::test]
async fn published_messages_reach_the_club_feed() {
    let store = Arc::new(Mutex::new(MockServer::new()));
    let admin = Uuid::new_v4();
    let mut app = app(store.clone(), Some(AuthToken(admin)));
    let alice = login(&mut app, admin, "alice").await;
    let post = create_post(&mut app, admin, alice.0).await;
    let root = comment(&mut app, alice, post, None).await.unwrap();

    let fetched: Post = run_on_app::<(), _>(
        &mut app,
        "GET",
        &format!("/api/posts/{}", post.0),
        Some(alice.1),
        None,
    )
    .await
    .unwrap();
    assert_eq!(fetched.club_id, CLUB);

    let mut feed = store
        .lock()
        .await
        .subscribe(AuthToken(alice.1), CLUB)
        .unwrap();
    let msg = FeedMessage::Post(PostEvent::CommentEdit { comment: root });
    let () = run_on_app(
        &mut app,
        "POST",
        &format!("/api/clubs/{}/publish", CLUB.0),
        Some(alice.1),
        Some(&msg),
    )
    .await
    .unwrap();
    assert_eq!(feed.next().await, Some(msg.clone()));

    assert_eq!(
        run_on_app::<_, ()>(
            &mut app,
            "POST",
            "/api/clubs/2/publish",
            Some(alice.1),
            Some(&msg),
        )
        .await,
        Err(ApiError::PermissionDenied)
    );
}

#[tokio::test]
async fn publishing_refuses_forged_and_malformed_messages() {
    let store = Arc::new(Mutex::new(MockServer::new()));
    let admin = Uuid::new_v4();
    let mut app = app(store.clone(), Some(AuthToken(admin)));
    let alice = login(&mut app, admin, "alice").await;
    let bob = login(&mut app, admin, "bob").await;
    let post = create_post(&mut app, admin, alice.0).await;
    let root = comment(&mut app, alice, post, None).await.unwrap();
    let uri = format!("/api/clubs/{}/publish", CLUB.0);

    let forged = FeedMessage::Post(PostEvent::CommentDelete { comment: root });
    assert_eq!(
        run_on_app::<_, ()>(&mut app, "POST", &uri, Some(bob.1), Some(&forged)).await,
        Err(ApiError::PermissionDenied)
    );

    let unknown = serde_json::json!({ "type": "POST", "action": "COMMENT_PIN", "payload": {} });
    let res = run_on_app::<_, ()>(&mut app, "POST", &uri, Some(alice.1), Some(&unknown)).await;
    assert!(
        matches!(res, Err(ApiError::MalformedMessage(_))),
        "unexpected answer {res:?}"
    );
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    CreateUser {
        #[generator(bolero::generator::gen_with::<String>().len(0..8usize))]
        name: String,
    },
    Auth {
        uid: usize,
    },
    CreateComment {
        sid: usize,
        parent: Option<usize>,
        #[generator(bolero::generator::gen_with::<String>().len(0..8usize))]
        content: String,
    },
    EditComment {
        sid: usize,
        cid: usize,
        #[generator(bolero::generator::gen_with::<String>().len(0..8usize))]
        content: String,
    },
    DeleteComment {
        sid: usize,
        cid: usize,
    },
    ToggleLike {
        sid: usize,
    },
    ListComments {
        sid: usize,
    },
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

fn compare<T, E>(name: &str, app_res: Result<T, E>, mock_res: Result<T, E>)
where
    T: Debug + PartialEq,
    E: Debug + PartialEq,
{
    assert_eq!(
        app_res, mock_res,
        "app and mock did not return the same result for {name}"
    );
}

/// Everything but the creation time, which differs between both sides
fn shape(c: &Comment) -> (CommentId, Option<CommentId>, Option<CommentId>, UserId, &str, bool) {
    (
        c.id,
        c.parent_id,
        c.root_parent_id,
        c.author_id,
        &c.content,
        c.edited,
    )
}

struct Session {
    user: UserId,
    app: Uuid,
    mock: AuthToken,
}

struct ComparativeFuzzer {
    app: Router,
    admin_token: Uuid,
    mock: MockServer,
    post: PostId,
    names: Vec<String>,
    sessions: Vec<Session>,
    comments: Vec<CommentId>,
}

impl ComparativeFuzzer {
    async fn new() -> ComparativeFuzzer {
        let (mut app, admin_token) = new_app();
        let mut mock = MockServer::new();
        let owner = login(&mut app, admin_token, "owner").await;
        let post = create_post(&mut app, admin_token, owner.0).await;
        let mock_owner = mock
            .admin_create_user(NewUser {
                name: String::from("owner"),
                password: String::from("secret"),
                avatar: None,
            })
            .unwrap();
        let mock_post = mock
            .admin_create_post(NewPost {
                club_id: CLUB,
                author_id: mock_owner.id,
                content: String::from("bake sale next week"),
            })
            .unwrap();
        assert_eq!((owner.0, post), (mock_owner.id, mock_post.id));
        ComparativeFuzzer {
            app,
            admin_token,
            mock,
            post,
            names: vec![String::from("owner")],
            sessions: Vec::new(),
            comments: Vec::new(),
        }
    }

    fn session(&self, sid: usize) -> Option<&Session> {
        resize_int(sid, ..self.sessions.len()).map(|s| &self.sessions[s])
    }

    fn comment_id(&self, cid: usize) -> CommentId {
        resize_int(cid, ..self.comments.len()).map_or(CommentId(0), |c| self.comments[c])
    }

    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::CreateUser { name } => {
                let new_user = NewUser {
                    password: name.clone(),
                    name,
                    avatar: None,
                };
                let app_res = run_on_app(
                    &mut self.app,
                    "POST",
                    "/api/admin/create-user",
                    Some(self.admin_token),
                    Some(&new_user),
                )
                .await;
                let mock_res = self.mock.admin_create_user(new_user.clone());
                if mock_res.is_ok() {
                    self.names.push(new_user.name);
                }
                compare("CreateUser", app_res, mock_res);
            }
            FuzzOp::Auth { uid } => {
                let Some(uid) = resize_int(uid, ..self.names.len()) else {
                    return;
                };
                let name = self.names[uid].clone();
                let password = match uid {
                    0 => String::from("secret"),
                    _ => name.clone(),
                };
                let session = NewSession::new(name, password);
                let app_tok: Result<AuthToken, _> =
                    run_on_app(&mut self.app, "POST", "/api/auth", None, Some(&session)).await;
                let mock_tok = self.mock.auth(session);
                if let (&Ok(app), &Ok(mock)) = (&app_tok, &mock_tok) {
                    let user = self.mock.whoami(mock).unwrap();
                    self.sessions.push(Session {
                        user,
                        app: app.0,
                        mock,
                    });
                }
                compare("Auth", app_tok.map(|_| ()), mock_tok.map(|_| ()));
            }
            FuzzOp::CreateComment {
                sid,
                parent,
                content,
            } => {
                let Some(s) = self.session(sid) else { return };
                let (user, app_tok, mock_tok) = (s.user, s.app, s.mock);
                let c = NewComment {
                    post_id: self.post,
                    author_id: user,
                    content,
                    parent_id: parent.map(|p| self.comment_id(p)),
                };
                let app_res: Result<Comment, _> = run_on_app(
                    &mut self.app,
                    "POST",
                    &format!("/api/posts/{}/comments", self.post.0),
                    Some(app_tok),
                    Some(&c),
                )
                .await;
                let mock_res = self.mock.create_comment(mock_tok, c);
                if let Ok(c) = &mock_res {
                    self.comments.push(c.id);
                }
                compare(
                    "CreateComment",
                    app_res.as_ref().map(shape),
                    mock_res.as_ref().map(shape),
                );
            }
            FuzzOp::EditComment { sid, cid, content } => {
                let Some(s) = self.session(sid) else { return };
                let (app_tok, mock_tok) = (s.app, s.mock);
                let id = self.comment_id(cid);
                let edit = EditComment { content };
                let app_res: Result<Comment, _> = run_on_app(
                    &mut self.app,
                    "PUT",
                    &format!("/api/comments/{}", id.0),
                    Some(app_tok),
                    Some(&edit),
                )
                .await;
                let mock_res = self.mock.edit_comment(mock_tok, id, edit);
                compare(
                    "EditComment",
                    app_res.as_ref().map(shape),
                    mock_res.as_ref().map(shape),
                );
            }
            FuzzOp::DeleteComment { sid, cid } => {
                let Some(s) = self.session(sid) else { return };
                let (app_tok, mock_tok) = (s.app, s.mock);
                let id = self.comment_id(cid);
                let app_res: Result<(), _> = run_on_app::<(), _>(
                    &mut self.app,
                    "DELETE",
                    &format!("/api/comments/{}", id.0),
                    Some(app_tok),
                    None,
                )
                .await;
                compare(
                    "DeleteComment",
                    app_res,
                    self.mock.delete_comment(mock_tok, id),
                );
            }
            FuzzOp::ToggleLike { sid } => {
                let Some(s) = self.session(sid) else { return };
                let (app_tok, mock_tok) = (s.app, s.mock);
                let app_res: Result<LikeToggled, _> = run_on_app::<(), _>(
                    &mut self.app,
                    "POST",
                    &format!("/api/posts/{}/like", self.post.0),
                    Some(app_tok),
                    None,
                )
                .await;
                compare(
                    "ToggleLike",
                    app_res,
                    self.mock.toggle_like(mock_tok, self.post),
                );
            }
            FuzzOp::ListComments { sid } => {
                let Some(s) = self.session(sid) else { return };
                let (app_tok, mock_tok) = (s.app, s.mock);
                let app_res: Result<Vec<Comment>, _> = run_on_app::<(), _>(
                    &mut self.app,
                    "GET",
                    &format!("/api/posts/{}/comments", self.post.0),
                    Some(app_tok),
                    None,
                )
                .await;
                let mock_res = self.mock.list_comments(mock_tok, self.post);
                compare(
                    "ListComments",
                    app_res.map(|l| l.iter().map(|c| c.id).collect::<Vec<_>>()),
                    mock_res.map(|l| l.iter().map(|c| c.id).collect::<Vec<_>>()),
                );
            }
        }
    }
}

do_tokio_test!(compare_with_mock, Vec<FuzzOp>, |ops: Vec<FuzzOp>| async move {
    let mut fuzzer = ComparativeFuzzer::new().await;
    for op in ops {
        fuzzer.execute_fuzz_op(op).await;
    }
});
