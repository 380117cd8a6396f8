#![cfg(test)]

use bolero::generator::TypeGenerator;
use std::{collections::HashSet, sync::Arc};

use crate::{
    api::{CommentId, LikeUpdate, PostEvent, PostId, UserId},
    tree::tests::comment,
    PostView,
};

const NUM_IDS: u8 = 12;

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    NewRoot(u8),
    /// Reply `id` to `parent`, with the root the server would report
    NewReply { id: u8, parent: u8, root: u8 },
    /// Reply whose `root_parent_id` is missing
    NewDirectReply { id: u8, parent: u8 },
    Edit(u8),
    Delete(u8),
    Like { viewer: bool, liked: bool, total: u8 },
    ForeignPost(u8),
}

fn id(i: u8) -> i64 {
    1 + i64::from(i % NUM_IDS)
}

fn to_event(view: &PostView, op: FuzzOp) -> PostEvent {
    match op {
        FuzzOp::NewRoot(i) => PostEvent::CommentNew {
            comment: comment(id(i), None, None),
        },
        FuzzOp::NewReply { id: i, parent, root } => PostEvent::CommentNew {
            comment: comment(id(i), Some(id(parent)), Some(id(root))),
        },
        FuzzOp::NewDirectReply { id: i, parent } => PostEvent::CommentNew {
            comment: comment(id(i), Some(id(parent)), None),
        },
        FuzzOp::Edit(i) => {
            let mut c = view
                .tree()
                .find(CommentId(id(i)))
                .cloned()
                .unwrap_or_else(|| comment(id(i), None, None));
            c.replies.clear();
            c.content.push('!');
            c.edited = true;
            PostEvent::CommentEdit { comment: c }
        }
        FuzzOp::Delete(i) => PostEvent::CommentDelete {
            comment: comment(id(i), None, None),
        },
        FuzzOp::Like {
            viewer,
            liked,
            total,
        } => PostEvent::LikeUpdate(LikeUpdate {
            post_id: PostId(1),
            user_id: if viewer { UserId(20) } else { UserId(21) },
            liked,
            total_likes: u64::from(total),
        }),
        FuzzOp::ForeignPost(i) => {
            let mut c = comment(id(i), None, None);
            c.post_id = PostId(2);
            PostEvent::CommentNew { comment: c }
        }
    }
}

fn check_shape(view: &PostView) {
    let mut seen = HashSet::new();
    for root in view.tree().roots() {
        assert!(root.is_root(), "non-root {:?} at the top level", root.id);
        assert!(seen.insert(root.id), "{:?} appears twice", root.id);
        for r in root.replies.iter() {
            assert_eq!(r.bucket_key(), Some(root.id));
            assert!(r.replies.is_empty(), "reply {:?} holds replies", r.id);
            assert!(seen.insert(r.id), "{:?} appears twice", r.id);
        }
    }
    assert_eq!(seen.len(), view.tree().len());
}

#[test]
fn random_event_sequences_keep_the_tree_well_formed() {
    bolero::check!()
        .with_type::<Vec<FuzzOp>>()
        .cloned()
        .for_each(|ops| {
            let mut view = PostView::new(PostId(1), 0, Arc::new(UserId(20)));
            for op in ops {
                let deleted = match op {
                    FuzzOp::Delete(i) => Some(CommentId(id(i))),
                    _ => None,
                };
                let before = view.tree().len();
                let event = to_event(&view, op);
                view.apply_event(event);
                check_shape(&view);
                if let Some(d) = deleted {
                    assert!(!view.tree().contains(d));
                } else {
                    assert!(view.tree().len() >= before);
                }
            }
        })
}
