use crate::{
    api::{CommentId, PostEvent, PostId},
    Inserted, PostView,
};

/// What applying a push-channel event did to a view
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Patched {
    OtherPost(PostId),
    Inserted(Inserted),
    Edited(CommentId),
    Deleted { id: CommentId, num_removed: usize },
    /// The event is about a comment that is not in the tree
    Missing(CommentId),
    Likes,
}

impl PostView {
    /// Applies a realtime event to the tree and like state, in place
    ///
    /// Events about other posts are ignored. UI state about comments that
    /// vanished is closed; everything else (drafts, open editor) is kept.
    pub fn apply_event(&mut self, event: PostEvent) -> Patched {
        if event.post_id() != self.post_id {
            return Patched::OtherPost(event.post_id());
        }
        match event {
            PostEvent::CommentNew { comment } => {
                let id = comment.id;
                let res = self.tree.insert(comment);
                if let Inserted::Orphan { root } = res {
                    tracing::debug!(?id, ?root, "dropping reply to a root not in the tree");
                }
                Patched::Inserted(res)
            }
            PostEvent::CommentEdit { comment } => {
                let id = comment.id;
                match self.tree.merge(comment) {
                    true => Patched::Edited(id),
                    false => Patched::Missing(id),
                }
            }
            PostEvent::CommentDelete { comment } => match self.tree.remove(comment.id) {
                None => Patched::Missing(comment.id),
                Some(removed) => {
                    self.close_stale_ui();
                    Patched::Deleted {
                        id: comment.id,
                        num_removed: 1 + removed.replies.len(),
                    }
                }
            },
            PostEvent::LikeUpdate(u) => {
                let viewer = self.viewer();
                self.likes.apply_remote(viewer, &u);
                Patched::Likes
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        api::{Comment, LikeUpdate, UserId},
        tree::tests::{comment, ids},
        CommentTree, PostMsg,
    };

    const VIEWER: UserId = UserId(20);

    fn view() -> PostView {
        let mut v = PostView::new(PostId(1), 10, Arc::new(VIEWER));
        v.tree = CommentTree::from_flat(vec![
            comment(1, None, None),
            comment(2, Some(1), Some(1)),
            comment(3, Some(2), Some(1)),
        ]);
        v
    }

    fn reply_ids(v: &PostView, root: usize) -> Vec<i64> {
        ids(&v.tree().roots()[root].replies)
    }

    #[test]
    fn new_comments_are_inserted_once() {
        let mut v = view();
        let c = comment(5, None, None);
        assert_eq!(
            v.apply_event(PostEvent::CommentNew { comment: c.clone() }),
            Patched::Inserted(Inserted::Root)
        );
        assert_eq!(
            v.apply_event(PostEvent::CommentNew { comment: c }),
            Patched::Inserted(Inserted::Duplicate)
        );
        assert_eq!(ids(v.tree().roots()), vec![5, 1]);
        assert_eq!(v.tree().len(), 4);
    }

    #[test]
    fn new_replies_land_in_their_bucket() {
        let mut v = view();
        v.apply_event(PostEvent::CommentNew { comment: comment(4, Some(3), Some(1)) });
        assert_eq!(reply_ids(&v, 0), vec![2, 3, 4]);
        assert_eq!(
            v.apply_event(PostEvent::CommentNew { comment: comment(9, Some(8), Some(8)) }),
            Patched::Inserted(Inserted::Orphan {
                root: CommentId(8)
            })
        );
        assert_eq!(v.tree().len(), 4);
    }

    #[test]
    fn edits_keep_replies() {
        let mut v = view();
        let mut edit = comment(1, None, None);
        edit.content = String::from("x");
        assert_eq!(
            v.apply_event(PostEvent::CommentEdit { comment: edit }),
            Patched::Edited(CommentId(1))
        );
        assert_eq!(v.tree().roots()[0].content, "x");
        assert_eq!(reply_ids(&v, 0), vec![2, 3]);
        assert_eq!(
            v.apply_event(PostEvent::CommentEdit { comment: comment(7, None, None) }),
            Patched::Missing(CommentId(7))
        );
    }

    #[test]
    fn deleting_a_root_takes_its_replies() {
        let mut v = view();
        assert_eq!(
            v.apply_event(PostEvent::CommentDelete { comment: comment(1, None, None) }),
            Patched::Deleted {
                id: CommentId(1),
                num_removed: 3
            }
        );
        assert!(v.tree().is_empty());
    }

    #[test]
    fn deleting_a_reply_takes_only_it() {
        let mut v = view();
        v.apply_event(PostEvent::CommentDelete { comment: comment(2, Some(1), Some(1)) });
        assert_eq!(ids(v.tree().roots()), vec![1]);
        assert_eq!(reply_ids(&v, 0), vec![3]);
    }

    #[test]
    fn other_posts_are_ignored() {
        let mut v = view();
        let mut c: Comment = comment(5, None, None);
        c.post_id = PostId(2);
        assert_eq!(
            v.apply_event(PostEvent::CommentNew { comment: c }),
            Patched::OtherPost(PostId(2))
        );
        assert_eq!(
            v.apply_event(PostEvent::LikeUpdate(LikeUpdate {
                post_id: PostId(2),
                user_id: VIEWER,
                liked: true,
                total_likes: 99,
            })),
            Patched::OtherPost(PostId(2))
        );
        assert_eq!(v.tree().len(), 3);
        assert_eq!(v.likes().like_count, 10);
    }

    #[test]
    fn like_updates_follow_the_viewer() {
        let mut v = view();
        v.apply_event(PostEvent::LikeUpdate(LikeUpdate {
            post_id: PostId(1),
            user_id: VIEWER,
            liked: true,
            total_likes: 11,
        }));
        assert!(v.likes().is_liked);
        assert_eq!(v.likes().like_count, 11);
        v.apply_event(PostEvent::LikeUpdate(LikeUpdate {
            post_id: PostId(1),
            user_id: UserId(21),
            liked: false,
            total_likes: 12,
        }));
        assert!(v.likes().is_liked);
        assert_eq!(v.likes().like_count, 12);
    }

    #[test]
    fn unrelated_events_keep_an_open_editor() {
        let mut v = view();
        let mut own = comment(4, Some(1), Some(1));
        own.author_id = VIEWER;
        v.apply_event(PostEvent::CommentNew { comment: own });
        v.update(PostMsg::StartEdit(CommentId(4)));
        v.update(PostMsg::SetEditDraft(String::from("half-typed")));
        v.apply_event(PostEvent::CommentNew { comment: comment(6, None, None) });
        v.apply_event(PostEvent::CommentDelete { comment: comment(2, Some(1), Some(1)) });
        v.apply_event(PostEvent::CommentEdit { comment: comment(3, Some(2), Some(1)) });
        let editor = v.editor().unwrap();
        assert_eq!(editor.id, CommentId(4));
        assert_eq!(editor.draft, "half-typed");
    }

    #[test]
    fn deleting_the_edited_comment_closes_the_editor() {
        let mut v = view();
        let mut own = comment(4, Some(1), Some(1));
        own.author_id = VIEWER;
        v.apply_event(PostEvent::CommentNew { comment: own });
        v.update(PostMsg::StartEdit(CommentId(4)));
        v.update(PostMsg::OpenReply(CommentId(3)));
        v.apply_event(PostEvent::CommentDelete { comment: comment(1, None, None) });
        assert!(v.editor().is_none());
        assert!(v.reply_box().is_none());
    }
}
