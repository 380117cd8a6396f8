use crate::{PostId, UserId};

/// Answer to a like toggle: the viewer's new state and the post's total
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LikeToggled {
    pub liked: bool,
    pub count: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LikeStatus {
    pub liked: bool,
}

/// Payload of a `LIKE_UPDATE` feed message
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeUpdate {
    pub post_id: PostId,
    pub user_id: UserId,
    pub liked: bool,
    pub total_likes: u64,
}
