use anyhow::{anyhow, Context};
use serde_json::json;

use crate::{CommentId, PostId};

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not logged in")]
    Unauthenticated,

    #[error("Post not found {0:?}")]
    PostNotFound(PostId),

    #[error("Comment not found {0:?}")]
    CommentNotFound(CommentId),

    #[error("Parent comment not found {0:?}")]
    ParentNotFound(CommentId),

    #[error("Content must not be empty")]
    EmptyContent,

    #[error("Name already used {0}")]
    NameAlreadyUsed(String),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Invalid character in name {0:?}")]
    InvalidName(String),

    #[error("Malformed feed message: {0}")]
    MalformedMessage(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::PostNotFound(_) => StatusCode::NOT_FOUND,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::ParentNotFound(_) => StatusCode::BAD_REQUEST,
            Error::EmptyContent => StatusCode::BAD_REQUEST,
            Error::NameAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::InvalidName(_) => StatusCode::BAD_REQUEST,
            Error::MalformedMessage(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Errors the UI raises itself, before anything is sent to the server
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Unauthenticated
                | Error::EmptyContent
                | Error::NullByteInString(_)
                | Error::InvalidName(_)
        )
    }

    pub fn contents(&self) -> Vec<u8> {
        let code = self.status_code().as_u16();
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "code": code,
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "code": code,
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::Unauthenticated => json!({
                "code": code,
                "message": "not logged in",
                "type": "unauthenticated",
            }),
            Error::PostNotFound(p) => json!({
                "code": code,
                "message": "post not found",
                "type": "post-not-found",
                "id": p,
            }),
            Error::CommentNotFound(c) => json!({
                "code": code,
                "message": "comment not found",
                "type": "comment-not-found",
                "id": c,
            }),
            Error::ParentNotFound(c) => json!({
                "code": code,
                "message": "parent comment not found",
                "type": "parent-not-found",
                "id": c,
            }),
            Error::EmptyContent => json!({
                "code": code,
                "message": "content must not be empty",
                "type": "empty-content",
            }),
            Error::NameAlreadyUsed(n) => json!({
                "code": code,
                "message": "name already used",
                "type": "conflict-name",
                "name": n,
            }),
            Error::NullByteInString(s) => json!({
                "code": code,
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::InvalidName(n) => json!({
                "code": code,
                "message": "there was an invalid character in a user name",
                "type": "invalid-name",
                "name": n,
            }),
            Error::MalformedMessage(reason) => json!({
                "code": code,
                "message": "malformed feed message",
                "type": "malformed-message",
                "reason": reason,
            }),
        })
        .expect("serializing error")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let id = || {
            data.get("id")
                .and_then(|id| id.as_i64())
                .ok_or_else(|| anyhow!("error is about a missing object but has no id"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "unauthenticated" => Error::Unauthenticated,
                "post-not-found" => Error::PostNotFound(PostId(id()?)),
                "comment-not-found" => Error::CommentNotFound(CommentId(id()?)),
                "parent-not-found" => Error::ParentNotFound(CommentId(id()?)),
                "empty-content" => Error::EmptyContent,
                "conflict-name" => Error::NameAlreadyUsed(String::from(
                    data.get("name")
                        .and_then(|n| n.as_str())
                        .ok_or_else(|| anyhow!("error is a name conflict without a name"))?,
                )),
                "null-byte" => Error::NullByteInString(String::from(
                    data.get("string").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                "invalid-name" => Error::InvalidName(String::from(
                    data.get("name").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is about an invalid name but no name was provided")
                    })?,
                )),
                "malformed-message" => Error::MalformedMessage(String::from(
                    data.get("reason").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is about a malformed message but has no reason")
                    })?,
                )),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
