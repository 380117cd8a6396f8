use std::{fmt, sync::Arc};

use crate::{
    api::{
        Comment, CommentId, EditComment, Error as ApiError, FeedMessage, LikeStatus, LikeToggled,
        NewComment, PostEvent, PostId, UserId,
    },
    CommentTree, CurrentUser, Error, LikeState,
};

/// Everything that can happen to a post view
///
/// User actions, backend answers and push-channel events all go through
/// `PostView::update`, one at a time.
#[derive(Debug)]
pub enum PostMsg {
    Reload,

    SetDraft(String),
    SubmitComment,

    OpenReply(CommentId),
    SetReplyDraft(String),
    CloseReply,
    SubmitReply,

    StartEdit(CommentId),
    SetEditDraft(String),
    CancelEdit,
    SubmitEdit,

    RequestDelete(CommentId),
    ConfirmDelete,
    CancelDelete,

    ToggleLike,

    CommentsLoaded(Result<Vec<Comment>, Error>),
    LikeStatusLoaded(Result<LikeStatus, Error>),
    CommentCreated(Result<Comment, Error>),
    CommentEdited(CommentId, Result<Comment, Error>),
    CommentDeleted(CommentId, Result<(), Error>),
    LikeToggled(Result<LikeToggled, Error>),

    Feed(PostEvent),
}

/// Network request to run on behalf of the view
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Effect {
    FetchComments(PostId),
    FetchLikeStatus(PostId),
    CreateComment(NewComment),
    EditComment(CommentId, EditComment),
    DeleteComment(CommentId),
    ToggleLike(PostId),
    Broadcast(FeedMessage),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// Toast-like message for the user
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReplyBox {
    pub to: CommentId,
    pub draft: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Editor {
    pub id: CommentId,
    pub draft: String,
    pub submitting: bool,
}

/// Pending confirmation before a delete request is sent
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeleteConfirmation {
    pub id: CommentId,
    pub is_root: bool,
    pub num_replies: usize,
}

impl fmt::Display for DeleteConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_root, self.num_replies) {
            (false, _) => write!(f, "Delete this reply?"),
            (true, 0) => write!(f, "Delete this comment?"),
            (true, 1) => write!(f, "Delete this comment? Its reply will be deleted too."),
            (true, n) => write!(f, "Delete this comment? Its {n} replies will be deleted too."),
        }
    }
}

/// State of one post's comment section and like button
pub struct PostView {
    pub(crate) post_id: PostId,
    pub(crate) viewer: Arc<dyn CurrentUser>,
    pub(crate) tree: CommentTree,
    pub(crate) likes: LikeState,
    pub(crate) loading: bool,

    pub(crate) draft: String,
    pub(crate) reply: Option<ReplyBox>,
    pub(crate) editor: Option<Editor>,
    pub(crate) deleting: Option<DeleteConfirmation>,

    pub(crate) notices: Vec<Notice>,
}

impl PostView {
    /// Creates an empty view, `like_count` being the count shipped along
    /// with the post itself
    pub fn new(post_id: PostId, like_count: u64, viewer: Arc<dyn CurrentUser>) -> PostView {
        PostView {
            post_id,
            viewer,
            tree: CommentTree::new(),
            likes: LikeState::new(false, like_count),
            loading: false,
            draft: String::new(),
            reply: None,
            editor: None,
            deleting: None,
            notices: Vec::new(),
        }
    }

    /// Effects to run when the view is first shown
    pub fn init(&mut self) -> Vec<Effect> {
        self.update(PostMsg::Reload)
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub fn viewer(&self) -> Option<UserId> {
        self.viewer.current_user()
    }

    pub fn tree(&self) -> &CommentTree {
        &self.tree
    }

    pub fn likes(&self) -> &LikeState {
        &self.likes
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn reply_box(&self) -> Option<&ReplyBox> {
        self.reply.as_ref()
    }

    pub fn editor(&self) -> Option<&Editor> {
        self.editor.as_ref()
    }

    pub fn delete_confirmation(&self) -> Option<&DeleteConfirmation> {
        self.deleting.as_ref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn update(&mut self, msg: PostMsg) -> Vec<Effect> {
        match msg {
            PostMsg::Reload => {
                self.loading = true;
                return vec![
                    Effect::FetchComments(self.post_id),
                    Effect::FetchLikeStatus(self.post_id),
                ];
            }

            PostMsg::SetDraft(d) => self.draft = d,
            PostMsg::SubmitComment => match self.prepare_comment(None, &self.draft) {
                Ok(c) => {
                    self.draft.clear();
                    return vec![Effect::CreateComment(c)];
                }
                Err(e) => self.warn(e.to_string()),
            },

            PostMsg::OpenReply(to) => {
                if self.tree.contains(to) {
                    self.reply = Some(ReplyBox {
                        to,
                        draft: String::new(),
                    });
                }
            }
            PostMsg::SetReplyDraft(d) => {
                if let Some(r) = &mut self.reply {
                    r.draft = d;
                }
            }
            PostMsg::CloseReply => self.reply = None,
            PostMsg::SubmitReply => {
                if let Some(r) = &self.reply {
                    match self.prepare_comment(Some(r.to), &r.draft) {
                        Ok(c) => {
                            self.reply = None;
                            return vec![Effect::CreateComment(c)];
                        }
                        Err(e) => self.warn(e.to_string()),
                    }
                }
            }

            PostMsg::StartEdit(id) => {
                let found = self.tree.find(id).map(|c| (c.author_id, c.content.clone()));
                match found {
                    None => tracing::debug!(?id, "not editing comment absent from the tree"),
                    Some((author, _)) if Some(author) != self.viewer() => {
                        self.warn(ApiError::PermissionDenied.to_string())
                    }
                    Some((_, content)) => {
                        self.editor = Some(Editor {
                            id,
                            draft: content,
                            submitting: false,
                        })
                    }
                }
            }
            PostMsg::SetEditDraft(d) => {
                if let Some(e) = &mut self.editor {
                    e.draft = d;
                }
            }
            PostMsg::CancelEdit => self.editor = None,
            PostMsg::SubmitEdit => {
                let edit = match &self.editor {
                    Some(e) if !e.submitting => (
                        e.id,
                        EditComment {
                            content: e.draft.trim().to_string(),
                        },
                    ),
                    _ => return Vec::new(),
                };
                if let Err(e) = edit.1.validate() {
                    self.warn(e.to_string());
                    return Vec::new();
                }
                if let Some(e) = &mut self.editor {
                    e.submitting = true;
                }
                return vec![Effect::EditComment(edit.0, edit.1)];
            }

            PostMsg::RequestDelete(id) => match self.tree.find(id) {
                None => tracing::debug!(?id, "not deleting comment absent from the tree"),
                Some(c) => {
                    self.deleting = Some(DeleteConfirmation {
                        id,
                        is_root: c.is_root(),
                        num_replies: c.replies.len(),
                    })
                }
            },
            PostMsg::CancelDelete => self.deleting = None,
            PostMsg::ConfirmDelete => {
                if let Some(d) = self.deleting.take() {
                    return vec![Effect::DeleteComment(d.id)];
                }
            }

            PostMsg::ToggleLike => {
                if self.viewer().is_none() {
                    self.warn(ApiError::Unauthenticated.to_string());
                } else if self.likes.begin_toggle() {
                    return vec![Effect::ToggleLike(self.post_id)];
                } else {
                    tracing::trace!("like toggle already in flight");
                }
            }

            PostMsg::CommentsLoaded(Ok(comments)) => {
                self.loading = false;
                self.tree = CommentTree::from_flat(comments);
                self.close_stale_ui();
            }
            PostMsg::CommentsLoaded(Err(e)) => {
                self.loading = false;
                self.fail("Could not load comments", &e);
            }
            PostMsg::LikeStatusLoaded(Ok(status)) => self.likes.apply_status(status.liked),
            PostMsg::LikeStatusLoaded(Err(e)) => {
                tracing::warn!(err = ?e, post = ?self.post_id, "failed fetching like status")
            }
            PostMsg::CommentCreated(Ok(c)) => {
                // inserted once the push channel echoes it back
                tracing::debug!(id = ?c.id, "comment created");
            }
            PostMsg::CommentCreated(Err(e)) => self.fail("Could not post comment", &e),
            PostMsg::CommentEdited(id, Ok(c)) => {
                if self.editor.as_ref().map(|e| e.id) == Some(id) {
                    self.editor = None;
                }
                if !self.tree.merge(c.clone()) {
                    tracing::debug!(?id, "edited comment left the tree, not rebroadcasting");
                    return Vec::new();
                }
                return vec![Effect::Broadcast(FeedMessage::Post(PostEvent::CommentEdit {
                    comment: c,
                }))];
            }
            PostMsg::CommentEdited(id, Err(e)) => {
                if let Some(editor) = self.editor.as_mut().filter(|e| e.id == id) {
                    editor.submitting = false;
                }
                self.fail("Could not edit comment", &e);
            }
            PostMsg::CommentDeleted(id, Ok(())) => {
                // removed once the push channel echoes it back
                tracing::debug!(?id, "comment deleted");
            }
            PostMsg::CommentDeleted(_, Err(e)) => self.fail("Could not delete comment", &e),
            PostMsg::LikeToggled(Ok(answer)) => self.likes.reconcile(answer),
            PostMsg::LikeToggled(Err(e)) => {
                self.likes.rollback();
                self.fail("Could not update like", &e);
            }

            PostMsg::Feed(e) => {
                let patched = self.apply_event(e);
                tracing::debug!(post = ?self.post_id, ?patched, "applied feed event");
            }
        }
        Vec::new()
    }

    fn prepare_comment(
        &self,
        parent_id: Option<CommentId>,
        draft: &str,
    ) -> Result<NewComment, ApiError> {
        let author_id = self.viewer().ok_or(ApiError::Unauthenticated)?;
        let c = NewComment {
            post_id: self.post_id,
            author_id,
            content: draft.trim().to_string(),
            parent_id,
        };
        c.validate()?;
        Ok(c)
    }

    /// Closes the reply box, editor and delete confirmation if the comment
    /// they are about is gone
    pub(crate) fn close_stale_ui(&mut self) {
        let tree = &self.tree;
        if self.reply.as_ref().map_or(false, |r| !tree.contains(r.to)) {
            self.reply = None;
        }
        if self.editor.as_ref().map_or(false, |e| !tree.contains(e.id)) {
            self.editor = None;
        }
        if self.deleting.as_ref().map_or(false, |d| !tree.contains(d.id)) {
            self.deleting = None;
        }
    }

    fn warn(&mut self, text: String) {
        self.notices.push(Notice {
            level: NoticeLevel::Warning,
            text,
        });
    }

    fn fail(&mut self, what: &str, err: &Error) {
        tracing::warn!(?err, post = ?self.post_id, "{what}");
        let level = match err.is_validation() {
            true => NoticeLevel::Warning,
            false => NoticeLevel::Error,
        };
        self.notices.push(Notice {
            level,
            text: format!("{what}: {err}"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::LikeToggled,
        tree::tests::{comment, ids},
    };

    const VIEWER: UserId = UserId(20);

    fn view() -> PostView {
        let mut v = PostView::new(PostId(1), 10, Arc::new(VIEWER));
        let mut own = comment(4, Some(1), Some(1));
        own.author_id = VIEWER;
        v.update(PostMsg::CommentsLoaded(Ok(vec![
            comment(1, None, None),
            comment(2, Some(1), Some(1)),
            comment(3, Some(2), Some(1)),
            own,
        ])));
        v
    }

    fn failure() -> Error {
        Error::Anyhow(anyhow::anyhow!("connection reset"))
    }

    #[test]
    fn init_loads_comments_and_like_status() {
        let mut v = PostView::new(PostId(3), 0, Arc::new(VIEWER));
        assert_eq!(
            v.init(),
            vec![
                Effect::FetchComments(PostId(3)),
                Effect::FetchLikeStatus(PostId(3))
            ]
        );
        assert!(v.is_loading());
        v.update(PostMsg::CommentsLoaded(Ok(vec![
            comment(1, None, None),
            comment(2, Some(1), None),
        ])));
        assert!(!v.is_loading());
        assert_eq!(ids(&v.tree().roots()[0].replies), vec![2]);
        v.update(PostMsg::LikeStatusLoaded(Ok(LikeStatus { liked: true })));
        assert!(v.likes().is_liked);
    }

    #[test]
    fn failed_reload_keeps_the_old_tree() {
        let mut v = view();
        v.update(PostMsg::Reload);
        v.update(PostMsg::CommentsLoaded(Err(failure())));
        assert_eq!(v.tree().len(), 4);
        assert_eq!(v.notices()[0].level, NoticeLevel::Error);
    }

    #[test]
    fn comment_is_sent_but_not_inserted() {
        let mut v = view();
        v.update(PostMsg::SetDraft(String::from("  hello  ")));
        assert_eq!(
            v.update(PostMsg::SubmitComment),
            vec![Effect::CreateComment(NewComment {
                post_id: PostId(1),
                author_id: VIEWER,
                content: String::from("hello"),
                parent_id: None,
            })]
        );
        assert_eq!(v.draft(), "");
        assert_eq!(v.tree().len(), 4);

        v.update(PostMsg::CommentCreated(Err(failure())));
        assert_eq!(v.draft(), "");
        assert_eq!(v.take_notices().len(), 1);
        assert!(v.notices().is_empty());
    }

    #[test]
    fn empty_comment_is_refused() {
        let mut v = view();
        v.update(PostMsg::SetDraft(String::from(" \n ")));
        assert!(v.update(PostMsg::SubmitComment).is_empty());
        assert_eq!(v.draft(), " \n ");
        assert_eq!(v.notices()[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn anonymous_viewers_cannot_comment_or_like() {
        let mut v = PostView::new(PostId(1), 10, Arc::new(None::<UserId>));
        v.update(PostMsg::SetDraft(String::from("hi")));
        assert!(v.update(PostMsg::SubmitComment).is_empty());
        assert!(v.update(PostMsg::ToggleLike).is_empty());
        assert_eq!(v.likes().like_count, 10);
        assert_eq!(v.notices().len(), 2);
        assert_eq!(v.draft(), "hi");
    }

    #[test]
    fn replies_target_the_answered_comment() {
        let mut v = view();
        v.update(PostMsg::OpenReply(CommentId(3)));
        v.update(PostMsg::SetReplyDraft(String::from("agreed")));
        let effects = v.update(PostMsg::SubmitReply);
        match &effects[..] {
            [Effect::CreateComment(c)] => {
                assert_eq!(c.parent_id, Some(CommentId(3)));
                assert_eq!(c.content, "agreed");
            }
            e => panic!("unexpected effects {e:?}"),
        }
        assert!(v.reply_box().is_none());
    }

    #[test]
    fn successful_edit_merges_and_broadcasts() {
        let mut v = view();
        v.update(PostMsg::StartEdit(CommentId(4)));
        assert_eq!(v.editor().unwrap().draft, "comment 4");
        v.update(PostMsg::SetEditDraft(String::from("better")));
        assert_eq!(
            v.update(PostMsg::SubmitEdit),
            vec![Effect::EditComment(
                CommentId(4),
                EditComment {
                    content: String::from("better")
                }
            )]
        );
        assert!(v.editor().unwrap().submitting);
        assert!(v.update(PostMsg::SubmitEdit).is_empty());

        let mut updated = comment(4, Some(1), Some(1));
        updated.author_id = VIEWER;
        updated.content = String::from("better");
        updated.edited = true;
        let effects = v.update(PostMsg::CommentEdited(CommentId(4), Ok(updated.clone())));
        assert_eq!(
            effects,
            vec![Effect::Broadcast(FeedMessage::Post(PostEvent::CommentEdit {
                comment: updated
            }))]
        );
        assert!(v.editor().is_none());
        let c = v.tree().find(CommentId(4)).unwrap();
        assert_eq!(c.content, "better");
        assert!(c.edited);
    }

    #[test]
    fn edits_of_vanished_comments_are_not_broadcast() {
        let mut v = view();
        v.update(PostMsg::StartEdit(CommentId(4)));
        v.update(PostMsg::SetEditDraft(String::from("better")));
        v.update(PostMsg::SubmitEdit);
        v.update(PostMsg::Feed(PostEvent::CommentDelete {
            comment: comment(1, None, None),
        }));
        assert!(!v.tree().contains(CommentId(4)));

        let mut updated = comment(4, Some(1), Some(1));
        updated.author_id = VIEWER;
        updated.content = String::from("better");
        updated.edited = true;
        assert!(v
            .update(PostMsg::CommentEdited(CommentId(4), Ok(updated)))
            .is_empty());
        assert!(v.editor().is_none());
        assert!(!v.tree().contains(CommentId(4)));
    }

    #[test]
    fn failed_edit_keeps_the_editor_open() {
        let mut v = view();
        v.update(PostMsg::StartEdit(CommentId(4)));
        v.update(PostMsg::SetEditDraft(String::from("better")));
        v.update(PostMsg::SubmitEdit);
        assert!(v
            .update(PostMsg::CommentEdited(CommentId(4), Err(failure())))
            .is_empty());
        let editor = v.editor().unwrap();
        assert_eq!(editor.draft, "better");
        assert!(!editor.submitting);
        assert_eq!(v.tree().find(CommentId(4)).unwrap().content, "comment 4");
        assert_eq!(v.notices().len(), 1);
    }

    #[test]
    fn only_own_comments_are_editable() {
        let mut v = view();
        v.update(PostMsg::StartEdit(CommentId(2)));
        assert!(v.editor().is_none());
        assert_eq!(v.notices().len(), 1);
    }

    #[test]
    fn delete_waits_for_confirmation_then_for_the_echo() {
        let mut v = view();
        v.update(PostMsg::RequestDelete(CommentId(1)));
        let confirm = *v.delete_confirmation().unwrap();
        assert!(confirm.is_root);
        assert_eq!(
            confirm.to_string(),
            "Delete this comment? Its 3 replies will be deleted too."
        );
        assert!(v.update(PostMsg::CancelDelete).is_empty());
        assert!(v.delete_confirmation().is_none());

        v.update(PostMsg::RequestDelete(CommentId(2)));
        assert_eq!(
            v.delete_confirmation().unwrap().to_string(),
            "Delete this reply?"
        );
        assert_eq!(
            v.update(PostMsg::ConfirmDelete),
            vec![Effect::DeleteComment(CommentId(2))]
        );
        v.update(PostMsg::CommentDeleted(CommentId(2), Ok(())));
        assert!(v.tree().contains(CommentId(2)));
        v.update(PostMsg::Feed(PostEvent::CommentDelete {
            comment: comment(2, Some(1), Some(1)),
        }));
        assert!(!v.tree().contains(CommentId(2)));
    }

    #[test]
    fn like_toggle_rolls_back_on_failure() {
        let mut v = view();
        assert_eq!(
            v.update(PostMsg::ToggleLike),
            vec![Effect::ToggleLike(PostId(1))]
        );
        assert!(v.likes().is_liked);
        assert_eq!(v.likes().like_count, 11);
        assert!(v.update(PostMsg::ToggleLike).is_empty());
        v.update(PostMsg::LikeToggled(Err(failure())));
        assert!(!v.likes().is_liked);
        assert_eq!(v.likes().like_count, 10);
        assert!(!v.likes().is_in_flight());
    }

    #[test]
    fn like_toggle_settles_on_the_server_count() {
        let mut v = view();
        v.update(PostMsg::ToggleLike);
        v.update(PostMsg::LikeToggled(Ok(LikeToggled {
            liked: true,
            count: 15,
        })));
        assert!(v.likes().is_liked);
        assert_eq!(v.likes().like_count, 15);
        assert_eq!(
            v.update(PostMsg::ToggleLike),
            vec![Effect::ToggleLike(PostId(1))]
        );
    }
}
