use crate::{Error, PostId, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub i64);

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,

    /// Comment this one answers, `None` for a root comment
    #[serde(default)]
    pub parent_id: Option<CommentId>,

    /// Top-level ancestor, equal to `parent_id` for a direct reply
    #[serde(default)]
    pub root_parent_id: Option<CommentId>,

    pub author_id: UserId,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,

    pub content: String,
    pub created_at: Time,
    #[serde(default)]
    pub edited: bool,

    /// Flattened replies, only ever populated on root comments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Comment>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Id of the root comment whose reply list this comment belongs in
    ///
    /// Returns `None` for root comments. A present `root_parent_id` always
    /// wins, including an explicit `0`; only a missing one falls back to
    /// `parent_id`, which is correct for direct replies to a root.
    pub fn bucket_key(&self) -> Option<CommentId> {
        let parent = self.parent_id?;
        Some(self.root_parent_id.unwrap_or(parent))
    }
}

/// Request body for creating a root comment or a reply
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: PostId,
    pub author_id: UserId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_content(&self.content)
    }
}

/// Request body for editing a comment's content
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EditComment {
    pub content: String,
}

impl EditComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_content(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_wire_format() {
        let c: Comment = serde_json::from_str(
            r#"{
                "id": 3,
                "postId": 7,
                "parentId": 2,
                "rootParentId": 1,
                "authorId": 4,
                "authorName": "ana",
                "content": "hi",
                "createdAt": "2024-03-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(c.id, CommentId(3));
        assert_eq!(c.post_id, PostId(7));
        assert_eq!(c.bucket_key(), Some(CommentId(1)));
        assert!(!c.edited);
        assert!(c.replies.is_empty());
        assert!(c.author_avatar.is_none());
    }

    #[test]
    fn null_root_parent_falls_back_to_parent() {
        let c: Comment = serde_json::from_str(
            r#"{
                "id": 3, "postId": 7, "parentId": 2, "rootParentId": null,
                "authorId": 4, "authorName": "ana", "content": "hi",
                "createdAt": "2024-03-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(c.bucket_key(), Some(CommentId(2)));
    }

    #[test]
    fn zero_root_parent_is_kept() {
        let c: Comment = serde_json::from_str(
            r#"{
                "id": 3, "postId": 7, "parentId": 2, "rootParentId": 0,
                "authorId": 4, "authorName": "ana", "content": "hi",
                "createdAt": "2024-03-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(c.bucket_key(), Some(CommentId(0)));
    }

    #[test]
    fn roots_have_no_bucket() {
        let c: Comment = serde_json::from_str(
            r#"{
                "id": 1, "postId": 7, "parentId": null,
                "authorId": 4, "authorName": "ana", "content": "hi",
                "createdAt": "2024-03-01T10:00:00Z", "edited": true
            }"#,
        )
        .unwrap();
        assert!(c.is_root());
        assert!(c.edited);
        assert_eq!(c.bucket_key(), None);
    }

    #[test]
    fn empty_replies_are_not_serialized() {
        let c: Comment = serde_json::from_str(
            r#"{
                "id": 1, "postId": 7,
                "authorId": 4, "authorName": "ana", "content": "hi",
                "createdAt": "2024-03-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("replies").is_none());
        assert_eq!(json["parentId"], serde_json::Value::Null);
    }
}
