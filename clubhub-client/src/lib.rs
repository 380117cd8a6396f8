mod backend;
pub use backend::{Backend, CurrentUser, PushChannel};

pub mod driver;

mod error;
pub use error::Error;

mod fuzz;

mod likes;
pub use likes::LikeState;

mod patch;
pub use patch::Patched;

mod tree;
pub use tree::{CommentTree, Inserted};

mod view;
pub use view::{
    DeleteConfirmation, Editor, Effect, Notice, NoticeLevel, PostMsg, PostView, ReplyBox,
};

pub mod api {
    pub use clubhub_api::*;
}
