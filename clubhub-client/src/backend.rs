use async_trait::async_trait;

use crate::{
    api::{
        Comment, CommentId, EditComment, FeedMessage, LikeStatus, LikeToggled, NewComment,
        PostId, UserId,
    },
    Error,
};

/// REST contracts of the comment backend
///
/// Implementations are responsible for unwrapping the `{ code, data }`
/// envelope and for the authentication of the acting user.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, Error>;
    async fn create_comment(&self, comment: NewComment) -> Result<Comment, Error>;
    async fn edit_comment(&self, id: CommentId, edit: EditComment) -> Result<Comment, Error>;
    async fn delete_comment(&self, id: CommentId) -> Result<(), Error>;
    async fn toggle_like(&self, post: PostId) -> Result<LikeToggled, Error>;
    async fn like_status(&self, post: PostId) -> Result<LikeStatus, Error>;
}

/// Publishing side of a club's push channel
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn send(&self, msg: FeedMessage) -> Result<(), Error>;
}

/// Read-only access to the logged-in user
pub trait CurrentUser: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

impl CurrentUser for UserId {
    fn current_user(&self) -> Option<UserId> {
        Some(*self)
    }
}

impl CurrentUser for Option<UserId> {
    fn current_user(&self) -> Option<UserId> {
        *self
    }
}
