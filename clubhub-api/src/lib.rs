use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

mod auth;
pub use auth::{AuthToken, NewSession};

mod comment;
pub use comment::{Comment, CommentId, EditComment, NewComment};

mod error;
pub use error::Error;

mod event;
pub use event::{FeedMessage, PostEvent};

mod like;
pub use like::{LikeStatus, LikeToggled, LikeUpdate};

mod post;
pub use post::{ClubId, NewPost, Post, PostId};

mod user;
pub use user::{NewUser, User, UserId};

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

/// Status code carried by a successful `Envelope`
pub const CODE_OK: u16 = 200;

/// Response wrapper used by every REST endpoint
///
/// `code == 200` signals success, in which case `data` holds the payload.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Envelope<T> {
        Envelope {
            code: CODE_OK,
            data: Some(data),
            message: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    pub fn into_result(self) -> Result<T, Error> {
        match (self.code, self.data) {
            (CODE_OK, Some(data)) => Ok(data),
            (CODE_OK, None) => Err(Error::Unknown(String::from(
                "successful envelope without data",
            ))),
            (code, _) => Err(Self::failure(code, self.message)),
        }
    }

    /// For payload-less endpoints, where `data` is `null` on success
    pub fn into_unit(self) -> Result<(), Error> {
        match self.code {
            CODE_OK => Ok(()),
            code => Err(Self::failure(code, self.message)),
        }
    }

    fn failure(code: u16, message: Option<String>) -> Error {
        Error::Unknown(message.unwrap_or_else(|| format!("request failed with code {code}")))
    }
}

// The validate functions here reject things the backend could not store or
// that the UI must refuse before sending anything.

pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}

/// Comment bodies must have some non-whitespace content
pub fn validate_content(s: &str) -> Result<(), Error> {
    validate_string(s)?;
    match s.trim().is_empty() {
        true => Err(Error::EmptyContent),
        false => Ok(()),
    }
}
