use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use clubhub_client::{
    api::{
        AuthToken, ClubId, Comment, CommentId, EditComment, Error, FeedMessage, LikeStatus,
        LikeToggled, LikeUpdate, NewComment, NewPost, NewSession, NewUser, Post, PostEvent,
        PostId, User, UserId, Uuid,
    },
    Backend, PushChannel,
};
use futures::channel::mpsc;
use tokio::sync::Mutex;

mod e2e;

/// In-memory comment backend, serving every REST contract and fanning out
/// events to the feed subscribers of each club
pub struct MockServer {
    users: BTreeMap<UserId, DbUser>,
    sessions: HashMap<AuthToken, UserId>,
    posts: BTreeMap<PostId, Post>,
    // replies are stored flat, `replies` is always empty here
    comments: BTreeMap<CommentId, Comment>,
    likes: HashMap<PostId, BTreeSet<UserId>>,
    feeds: HashMap<ClubId, Vec<mpsc::UnboundedSender<FeedMessage>>>,
    last_id: i64,
}

#[derive(Debug)]
struct DbUser {
    name: String,
    // tests (of which mock-server is a part of) don't hash passwords
    pass: String,
    avatar: Option<String>,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            sessions: HashMap::new(),
            posts: BTreeMap::new(),
            comments: BTreeMap::new(),
            likes: HashMap::new(),
            feeds: HashMap::new(),
            last_id: 0,
        }
    }

    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Return the current number of users
    pub fn test_num_users(&self) -> usize {
        self.users.len()
    }

    pub fn admin_create_user(&mut self, u: NewUser) -> Result<User, Error> {
        u.validate()?;
        if self.users.values().any(|db| db.name == u.name) {
            return Err(Error::NameAlreadyUsed(u.name));
        }
        let id = UserId(self.next_id());
        self.users.insert(
            id,
            DbUser {
                name: u.name.clone(),
                pass: u.password,
                avatar: u.avatar.clone(),
            },
        );
        tracing::debug!(?id, name = %u.name, "created user");
        Ok(User {
            id,
            name: u.name,
            avatar: u.avatar,
        })
    }

    pub fn admin_create_post(&mut self, p: NewPost) -> Result<Post, Error> {
        p.validate()?;
        if !self.users.contains_key(&p.author_id) {
            return Err(Error::Unknown(format!("no user {:?}", p.author_id)));
        }
        let post = Post {
            id: PostId(self.next_id()),
            club_id: p.club_id,
            author_id: p.author_id,
            content: p.content,
            created_at: chrono::Utc::now(),
        };
        self.posts.insert(post.id, post.clone());
        Ok(post)
    }

    pub fn auth(&mut self, s: NewSession) -> Result<AuthToken, Error> {
        s.validate()?;
        let user = self
            .users
            .iter()
            .find(|(_, u)| u.name == s.user && u.pass == s.password)
            .map(|(id, _)| *id)
            .ok_or(Error::PermissionDenied)?;
        let tok = AuthToken(Uuid::new_v4());
        self.sessions.insert(tok, user);
        Ok(tok)
    }

    pub fn unauth(&mut self, tok: AuthToken) -> Result<(), Error> {
        self.sessions
            .remove(&tok)
            .map(|_| ())
            .ok_or(Error::PermissionDenied)
    }

    pub fn whoami(&self, tok: AuthToken) -> Result<UserId, Error> {
        self.sessions
            .get(&tok)
            .copied()
            .ok_or(Error::PermissionDenied)
    }

    fn post(&self, id: PostId) -> Result<&Post, Error> {
        self.posts.get(&id).ok_or(Error::PostNotFound(id))
    }

    pub fn fetch_post(&self, tok: AuthToken, id: PostId) -> Result<Post, Error> {
        self.whoami(tok)?;
        self.post(id).cloned()
    }

    /// Flat listing of a post's comments: roots newest first, each followed by
    /// all the replies in its bucket, oldest first
    pub fn list_comments(&self, tok: AuthToken, post: PostId) -> Result<Vec<Comment>, Error> {
        self.whoami(tok)?;
        self.post(post)?;
        let mut res = Vec::new();
        let roots = self
            .comments
            .values()
            .rev()
            .filter(|c| c.post_id == post && c.is_root());
        for root in roots {
            res.push(root.clone());
            res.extend(
                self.comments
                    .values()
                    .filter(|c| c.bucket_key() == Some(root.id))
                    .cloned(),
            );
        }
        Ok(res)
    }

    pub fn create_comment(&mut self, tok: AuthToken, c: NewComment) -> Result<Comment, Error> {
        let user = self.whoami(tok)?;
        if user != c.author_id {
            return Err(Error::PermissionDenied);
        }
        c.validate()?;
        let club = self.post(c.post_id)?.club_id;
        let root_parent_id = match c.parent_id {
            None => None,
            Some(parent) => match self.comments.get(&parent) {
                Some(p) if p.post_id == c.post_id => Some(p.bucket_key().unwrap_or(p.id)),
                _ => return Err(Error::ParentNotFound(parent)),
            },
        };
        let id = CommentId(self.next_id());
        let author = &self.users[&user];
        let comment = Comment {
            id,
            post_id: c.post_id,
            parent_id: c.parent_id,
            root_parent_id,
            author_id: user,
            author_name: author.name.clone(),
            author_avatar: author.avatar.clone(),
            content: c.content,
            created_at: chrono::Utc::now(),
            edited: false,
            replies: Vec::new(),
        };
        self.comments.insert(comment.id, comment.clone());
        self.relay(
            club,
            PostEvent::CommentNew {
                comment: comment.clone(),
            },
        );
        Ok(comment)
    }

    fn own_comment(&mut self, tok: AuthToken, id: CommentId) -> Result<&mut Comment, Error> {
        let user = self.whoami(tok)?;
        let c = self
            .comments
            .get_mut(&id)
            .ok_or(Error::CommentNotFound(id))?;
        match c.author_id == user {
            true => Ok(c),
            false => Err(Error::PermissionDenied),
        }
    }

    /// Edits are not relayed, it is up to the editing client to rebroadcast
    /// them
    pub fn edit_comment(
        &mut self,
        tok: AuthToken,
        id: CommentId,
        e: EditComment,
    ) -> Result<Comment, Error> {
        e.validate()?;
        let c = self.own_comment(tok, id)?;
        c.content = e.content;
        c.edited = true;
        Ok(c.clone())
    }

    /// Deletes a comment, along with all its replies if it is a root
    pub fn delete_comment(&mut self, tok: AuthToken, id: CommentId) -> Result<(), Error> {
        let c = self.own_comment(tok, id)?.clone();
        let club = self.post(c.post_id)?.club_id;
        self.comments.remove(&id);
        if c.is_root() {
            self.comments.retain(|_, r| r.bucket_key() != Some(id));
        }
        self.relay(club, PostEvent::CommentDelete { comment: c });
        Ok(())
    }

    pub fn toggle_like(&mut self, tok: AuthToken, post: PostId) -> Result<LikeToggled, Error> {
        let user = self.whoami(tok)?;
        let club = self.post(post)?.club_id;
        let likers = self.likes.entry(post).or_insert_with(BTreeSet::new);
        let liked = match likers.remove(&user) {
            true => false,
            false => likers.insert(user),
        };
        let count = likers.len() as u64;
        self.relay(
            club,
            PostEvent::LikeUpdate(LikeUpdate {
                post_id: post,
                user_id: user,
                liked,
                total_likes: count,
            }),
        );
        Ok(LikeToggled { liked, count })
    }

    pub fn like_status(&self, tok: AuthToken, post: PostId) -> Result<LikeStatus, Error> {
        let user = self.whoami(tok)?;
        self.post(post)?;
        let liked = self.likes.get(&post).map_or(false, |l| l.contains(&user));
        Ok(LikeStatus { liked })
    }

    pub fn num_likes(&self, post: PostId) -> u64 {
        self.likes.get(&post).map_or(0, |l| l.len() as u64)
    }

    /// Opens a feed of everything happening on the posts of `club`
    pub fn subscribe(
        &mut self,
        tok: AuthToken,
        club: ClubId,
    ) -> Result<mpsc::UnboundedReceiver<FeedMessage>, Error> {
        self.whoami(tok)?;
        let (sender, receiver) = mpsc::unbounded();
        self.feeds.entry(club).or_insert_with(Vec::new).push(sender);
        Ok(receiver)
    }

    /// Rebroadcasts a client's edit on the feed of `club`
    ///
    /// Only `COMMENT_EDIT`s of the caller's own comments, on posts of `club`,
    /// and matching what was stored are accepted. The stored comment is what
    /// gets relayed. Keepalives are not relayed.
    pub fn publish(&mut self, tok: AuthToken, club: ClubId, msg: FeedMessage) -> Result<(), Error> {
        let user = self.whoami(tok)?;
        let claimed = match msg {
            FeedMessage::Pong => return Ok(()),
            FeedMessage::Post(PostEvent::CommentEdit { comment }) => comment,
            FeedMessage::Post(e) => {
                tracing::debug!(?user, action = e.action(), "refusing client-published event");
                return Err(Error::PermissionDenied);
            }
        };
        let stored = self
            .comments
            .get(&claimed.id)
            .ok_or(Error::CommentNotFound(claimed.id))?;
        let matches = stored.author_id == user
            && stored.post_id == claimed.post_id
            && stored.content == claimed.content
            && stored.edited == claimed.edited;
        if !matches || self.post(stored.post_id)?.club_id != club {
            return Err(Error::PermissionDenied);
        }
        let comment = stored.clone();
        self.relay(club, PostEvent::CommentEdit { comment });
        Ok(())
    }

    fn relay(&mut self, club: ClubId, e: PostEvent) {
        tracing::debug!(?club, action = e.action(), post = ?e.post_id(), "relaying event");
        if let Some(feeds) = self.feeds.get_mut(&club) {
            let msg = FeedMessage::Post(e);
            feeds.retain(|f| f.unbounded_send(msg.clone()).is_ok());
        }
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

/// Session of one user on a shared `MockServer`, usable as the backend and
/// push channel of a post view
#[derive(Clone)]
pub struct MockBackend {
    pub server: Arc<Mutex<MockServer>>,
    pub token: AuthToken,
    pub club: ClubId,
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, clubhub_client::Error> {
        Ok(self.server.lock().await.list_comments(self.token, post)?)
    }

    async fn create_comment(&self, c: NewComment) -> Result<Comment, clubhub_client::Error> {
        Ok(self.server.lock().await.create_comment(self.token, c)?)
    }

    async fn edit_comment(
        &self,
        id: CommentId,
        e: EditComment,
    ) -> Result<Comment, clubhub_client::Error> {
        Ok(self.server.lock().await.edit_comment(self.token, id, e)?)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), clubhub_client::Error> {
        Ok(self.server.lock().await.delete_comment(self.token, id)?)
    }

    async fn toggle_like(&self, post: PostId) -> Result<LikeToggled, clubhub_client::Error> {
        Ok(self.server.lock().await.toggle_like(self.token, post)?)
    }

    async fn like_status(&self, post: PostId) -> Result<LikeStatus, clubhub_client::Error> {
        Ok(self.server.lock().await.like_status(self.token, post)?)
    }
}

#[async_trait]
impl PushChannel for MockBackend {
    async fn send(&self, msg: FeedMessage) -> Result<(), clubhub_client::Error> {
        Ok(self
            .server
            .lock()
            .await
            .publish(self.token, self.club, msg)?)
    }
}
