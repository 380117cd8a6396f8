use crate::{Comment, LikeUpdate, PostId};

/// Realtime change to one post, as relayed on its club's push channel
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(
    tag = "action",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum PostEvent {
    CommentNew { comment: Comment },
    CommentEdit { comment: Comment },
    CommentDelete { comment: Comment },
    LikeUpdate(LikeUpdate),
}

impl PostEvent {
    pub fn post_id(&self) -> PostId {
        match self {
            PostEvent::CommentNew { comment }
            | PostEvent::CommentEdit { comment }
            | PostEvent::CommentDelete { comment } => comment.post_id,
            PostEvent::LikeUpdate(u) => u.post_id,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            PostEvent::CommentNew { .. } => "COMMENT_NEW",
            PostEvent::CommentEdit { .. } => "COMMENT_EDIT",
            PostEvent::CommentDelete { .. } => "COMMENT_DELETE",
            PostEvent::LikeUpdate(_) => "LIKE_UPDATE",
        }
    }
}

/// Frame carried on a club push channel
///
/// On the wire this is `{ "type": "POST", "action": ..., "payload": ... }`,
/// or `{ "type": "PONG" }` in answer to a keepalive ping.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedMessage {
    Pong,
    Post(PostEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommentId, UserId};

    fn parse(frame: &[u8]) -> serde_json::Result<FeedMessage> {
        serde_json::from_slice(frame)
    }

    #[test]
    fn parses_comment_new() {
        let msg = parse(
            br#"{
                "type": "POST",
                "action": "COMMENT_NEW",
                "payload": { "comment": {
                    "id": 5, "postId": 2, "parentId": 1, "rootParentId": 1,
                    "authorId": 3, "authorName": "bo", "content": "hey",
                    "createdAt": "2024-03-01T10:00:00Z"
                } }
            }"#,
        )
        .unwrap();
        match msg {
            FeedMessage::Post(PostEvent::CommentNew { comment }) => {
                assert_eq!(comment.id, CommentId(5));
                assert_eq!(comment.bucket_key(), Some(CommentId(1)));
            }
            m => panic!("unexpected message {m:?}"),
        }
    }

    #[test]
    fn parses_like_update() {
        let msg = parse(
            br#"{"type":"POST","action":"LIKE_UPDATE",
                 "payload":{"postId":2,"userId":3,"liked":true,"totalLikes":11}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            FeedMessage::Post(PostEvent::LikeUpdate(LikeUpdate {
                post_id: PostId(2),
                user_id: UserId(3),
                liked: true,
                total_likes: 11,
            }))
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "POST");
        assert_eq!(json["action"], "LIKE_UPDATE");
        assert_eq!(json["payload"]["totalLikes"], 11);
    }

    #[test]
    fn comment_payloads_are_wrapped() {
        let c: Comment = serde_json::from_str(
            r#"{"id":1,"postId":2,"authorId":3,"authorName":"al",
                "content":"hi","createdAt":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        let json = serde_json::to_value(FeedMessage::Post(PostEvent::CommentDelete {
            comment: c,
        }))
        .unwrap();
        assert_eq!(json["action"], "COMMENT_DELETE");
        assert_eq!(json["payload"]["comment"]["id"], 1);
    }

    #[test]
    fn rejects_unknown_kinds() {
        assert!(parse(br#"{"type":"NEWS","action":"PUBLISH","payload":{}}"#).is_err());
        assert!(parse(br#"{"type":"POST","action":"COMMENT_PIN","payload":{}}"#).is_err());
        assert!(parse(br#"{"type":"POST","action":"COMMENT_NEW"}"#).is_err());
        assert!(parse(
            br#"{"type":"POST","action":"COMMENT_DELETE","payload":{"comment":{"id":1}}}"#
        )
        .is_err());
        assert!(parse(br#"{"action":"COMMENT_NEW","payload":{}}"#).is_err());
    }

    #[test]
    fn pong() {
        assert_eq!(parse(br#"{"type":"PONG"}"#).unwrap(), FeedMessage::Pong);
        assert_eq!(
            serde_json::to_value(FeedMessage::Pong).unwrap(),
            serde_json::json!({ "type": "PONG" })
        );
    }
}
