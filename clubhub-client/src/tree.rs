use std::collections::{HashMap, HashSet};

use crate::api::{Comment, CommentId};

/// Two-level comment tree of a post: root comments, each owning the flattened
/// list of all the replies below it
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentTree {
    roots: Vec<Comment>,
}

/// Outcome of inserting a comment into the tree
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Inserted {
    Root,
    Reply { root: CommentId },
    /// The id was already present, nothing changed
    Duplicate,
    /// The reply's root is not in the tree, the reply was dropped
    Orphan { root: CommentId },
}

impl CommentTree {
    pub fn new() -> CommentTree {
        CommentTree { roots: Vec::new() }
    }

    /// Builds the tree from a flat listing, as returned by the comment list
    /// query
    ///
    /// Roots keep their relative order, and so do the replies within each
    /// bucket. Replies nested in the listing are treated as if they directly
    /// followed their holder. Replies whose root is not part of the listing
    /// are dropped, as are repeated ids.
    pub fn from_flat(comments: Vec<Comment>) -> CommentTree {
        let mut seen = HashSet::new();
        let mut roots = Vec::new();
        let mut buckets: HashMap<CommentId, Vec<Comment>> = HashMap::new();
        let flat = comments.into_iter().flat_map(|mut c| {
            let nested = std::mem::take(&mut c.replies);
            std::iter::once(c).chain(nested)
        });
        for mut c in flat {
            if !seen.insert(c.id) {
                tracing::debug!(id = ?c.id, "ignoring repeated comment in listing");
                continue;
            }
            c.replies.clear();
            match c.bucket_key() {
                None => roots.push(c),
                Some(root) => buckets.entry(root).or_default().push(c),
            }
        }
        for r in roots.iter_mut() {
            r.replies = buckets.remove(&r.id).unwrap_or_default();
        }
        for (root, orphans) in buckets {
            tracing::debug!(
                ?root,
                num_replies = orphans.len(),
                "dropping replies whose root is not in the listing"
            );
        }
        CommentTree { roots }
    }

    pub fn roots(&self) -> &[Comment] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of comments, replies included
    pub fn len(&self) -> usize {
        self.roots.iter().map(|r| 1 + r.replies.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.roots
            .iter()
            .flat_map(|r| std::iter::once(r).chain(r.replies.iter()))
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.find(id).is_some()
    }

    pub fn find(&self, id: CommentId) -> Option<&Comment> {
        self.iter().find(|c| c.id == id)
    }

    fn find_mut(&mut self, id: CommentId) -> Option<&mut Comment> {
        for r in self.roots.iter_mut() {
            if r.id == id {
                return Some(r);
            }
            if let Some(c) = r.replies.iter_mut().find(|c| c.id == id) {
                return Some(c);
            }
        }
        None
    }

    /// Inserts a newly created comment
    ///
    /// Roots go first, replies go last in their root's bucket.
    pub fn insert(&mut self, mut comment: Comment) -> Inserted {
        if self.contains(comment.id) {
            return Inserted::Duplicate;
        }
        match comment.bucket_key() {
            None => {
                self.adopt_replies(comment.id, &mut comment.replies);
                self.roots.insert(0, comment);
                Inserted::Root
            }
            Some(root) => match self.roots.iter_mut().find(|r| r.id == root) {
                None => Inserted::Orphan { root },
                Some(r) => {
                    comment.replies.clear();
                    r.replies.push(comment);
                    Inserted::Reply { root }
                }
            },
        }
    }

    /// Overwrites a comment in place with `incoming`
    ///
    /// The already-loaded replies of a root are kept unless `incoming` carries
    /// some of its own. Returns false if the comment is not in the tree.
    pub fn merge(&mut self, mut incoming: Comment) -> bool {
        let is_root = self.roots.iter().any(|r| r.id == incoming.id);
        if is_root {
            self.adopt_replies(incoming.id, &mut incoming.replies);
        } else {
            incoming.replies.clear();
        }
        match self.find_mut(incoming.id) {
            None => false,
            Some(existing) => {
                if incoming.replies.is_empty() {
                    incoming.replies = std::mem::take(&mut existing.replies);
                }
                *existing = incoming;
                true
            }
        }
    }

    /// Filters replies brought along by root `holder` down to the ones the
    /// tree does not already hold elsewhere, flattening them
    fn adopt_replies(&self, holder: CommentId, replies: &mut Vec<Comment>) {
        let known = self
            .roots
            .iter()
            .filter(|r| r.id != holder)
            .flat_map(|r| std::iter::once(r).chain(r.replies.iter()))
            .map(|c| c.id)
            .chain(std::iter::once(holder))
            .collect::<HashSet<_>>();
        let mut seen = HashSet::new();
        replies.retain(|c| !known.contains(&c.id) && seen.insert(c.id));
        for c in replies.iter_mut() {
            c.replies.clear();
        }
    }

    /// Removes a comment, a root taking all its replies along
    pub fn remove(&mut self, id: CommentId) -> Option<Comment> {
        if let Some(pos) = self.roots.iter().position(|r| r.id == id) {
            return Some(self.roots.remove(pos));
        }
        for r in self.roots.iter_mut() {
            if let Some(pos) = r.replies.iter().position(|c| c.id == id) {
                return Some(r.replies.remove(pos));
            }
        }
        None
    }

    /// For a reply to another reply, the comment it answers
    ///
    /// Direct replies to a root return `None`, as being in the root's bucket
    /// already says who they answer.
    pub fn replying_to(&self, reply: &Comment) -> Option<&Comment> {
        let parent = reply.parent_id?;
        if Some(parent) == reply.bucket_key() {
            return None;
        }
        self.find(parent)
    }

    /// Display annotation of the form `replying to @name`
    pub fn reply_annotation(&self, reply: &Comment) -> Option<String> {
        self.replying_to(reply)
            .map(|p| format!("replying to @{}", p.author_name))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::api::{PostId, UserId};

    pub fn comment(id: i64, parent: Option<i64>, root: Option<i64>) -> Comment {
        Comment {
            id: CommentId(id),
            post_id: PostId(1),
            parent_id: parent.map(CommentId),
            root_parent_id: root.map(CommentId),
            author_id: UserId(id * 10),
            author_name: format!("user{id}"),
            author_avatar: None,
            content: format!("comment {id}"),
            created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            edited: false,
            replies: Vec::new(),
        }
    }

    pub fn ids(comments: &[Comment]) -> Vec<i64> {
        comments.iter().map(|c| c.id.0).collect()
    }

    fn sample() -> CommentTree {
        CommentTree::from_flat(vec![
            comment(1, None, None),
            comment(2, Some(1), Some(1)),
            comment(3, Some(2), Some(1)),
        ])
    }

    #[test]
    fn flattens_replies_under_their_root() {
        let tree = sample();
        assert_eq!(ids(tree.roots()), vec![1]);
        assert_eq!(ids(&tree.roots()[0].replies), vec![2, 3]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn keeps_input_order() {
        let tree = CommentTree::from_flat(vec![
            comment(9, None, None),
            comment(4, Some(1), None),
            comment(1, None, None),
            comment(8, Some(9), Some(9)),
            comment(2, Some(4), Some(1)),
            comment(5, Some(9), None),
        ]);
        assert_eq!(ids(tree.roots()), vec![9, 1]);
        assert_eq!(ids(&tree.roots()[0].replies), vec![8, 5]);
        assert_eq!(ids(&tree.roots()[1].replies), vec![4, 2]);
    }

    #[test]
    fn flattens_server_nested_replies() {
        let mut root = comment(1, None, None);
        root.replies = vec![comment(2, Some(1), Some(1))];
        let tree = CommentTree::from_flat(vec![root, comment(3, Some(1), Some(1))]);
        assert_eq!(ids(&tree.roots()[0].replies), vec![2, 3]);
    }

    #[test]
    fn drops_orphans_and_repeats() {
        let tree = CommentTree::from_flat(vec![
            comment(1, None, None),
            comment(1, None, None),
            comment(7, Some(6), Some(6)),
            comment(2, Some(1), Some(1)),
        ]);
        assert_eq!(tree.len(), 2);
        assert!(!tree.contains(CommentId(7)));
    }

    #[test]
    fn explicit_zero_root_is_a_real_bucket() {
        let tree = CommentTree::from_flat(vec![
            comment(0, None, None),
            comment(5, None, None),
            comment(6, Some(5), Some(0)),
        ]);
        assert_eq!(ids(&tree.roots()[0].replies), vec![6]);
        assert!(tree.roots()[1].replies.is_empty());
    }

    #[test]
    fn insert_is_idempotent() {
        let mut tree = sample();
        assert_eq!(tree.insert(comment(5, None, None)), Inserted::Root);
        assert_eq!(tree.insert(comment(5, None, None)), Inserted::Duplicate);
        assert_eq!(tree.iter().filter(|c| c.id == CommentId(5)).count(), 1);
        assert_eq!(ids(tree.roots()), vec![5, 1]);
    }

    #[test]
    fn insert_appends_replies() {
        let mut tree = sample();
        assert_eq!(
            tree.insert(comment(4, Some(3), Some(1))),
            Inserted::Reply { root: CommentId(1) }
        );
        assert_eq!(
            tree.insert(comment(6, Some(1), None)),
            Inserted::Reply { root: CommentId(1) }
        );
        assert_eq!(ids(&tree.roots()[0].replies), vec![2, 3, 4, 6]);
        assert_eq!(
            tree.insert(comment(8, Some(7), Some(7))),
            Inserted::Orphan { root: CommentId(7) }
        );
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn merge_keeps_replies() {
        let mut tree = sample();
        let mut edit = comment(1, None, None);
        edit.content = String::from("x");
        edit.edited = true;
        assert!(tree.merge(edit));
        let root = &tree.roots()[0];
        assert_eq!(root.content, "x");
        assert!(root.edited);
        assert_eq!(ids(&root.replies), vec![2, 3]);
    }

    #[test]
    fn merge_takes_incoming_replies() {
        let mut tree = sample();
        let mut edit = comment(1, None, None);
        edit.replies = vec![comment(3, Some(2), Some(1))];
        assert!(tree.merge(edit));
        assert_eq!(ids(&tree.roots()[0].replies), vec![3]);
    }

    #[test]
    fn merge_never_duplicates_replies() {
        let mut tree = sample();
        tree.insert(comment(5, None, None));
        tree.insert(comment(6, Some(5), Some(5)));
        let mut edit = comment(1, None, None);
        let mut nested = comment(7, Some(1), Some(1));
        nested.replies = vec![comment(8, Some(7), Some(1))];
        edit.replies = vec![
            comment(6, Some(5), Some(5)),
            comment(2, Some(1), Some(1)),
            comment(2, Some(1), Some(1)),
            comment(1, None, None),
            nested,
        ];
        assert!(tree.merge(edit));
        assert_eq!(ids(&tree.roots()[1].replies), vec![2, 7]);
        assert!(tree.find(CommentId(7)).unwrap().replies.is_empty());
        assert_eq!(ids(&tree.roots()[0].replies), vec![6]);
        let mut seen = HashSet::new();
        assert!(tree.iter().all(|c| seen.insert(c.id)));

        let mut reply_edit = comment(6, Some(5), Some(5));
        reply_edit.replies = vec![comment(9, Some(6), Some(5))];
        assert!(tree.merge(reply_edit));
        assert!(!tree.contains(CommentId(9)));
    }

    #[test]
    fn merge_edits_replies_in_place() {
        let mut tree = sample();
        let mut edit = comment(3, Some(2), Some(1));
        edit.content = String::from("fixed typo");
        assert!(tree.merge(edit));
        assert_eq!(tree.find(CommentId(3)).unwrap().content, "fixed typo");
        assert_eq!(ids(&tree.roots()[0].replies), vec![2, 3]);
        assert!(!tree.merge(comment(42, None, None)));
    }

    #[test]
    fn removing_a_root_cascades() {
        let mut tree = sample();
        assert!(tree.remove(CommentId(1)).is_some());
        assert!(tree.is_empty());
        assert!(!tree.contains(CommentId(2)));
        assert!(!tree.contains(CommentId(3)));
    }

    #[test]
    fn removing_a_reply_keeps_siblings() {
        let mut tree = sample();
        assert!(tree.remove(CommentId(2)).is_some());
        assert_eq!(ids(tree.roots()), vec![1]);
        assert_eq!(ids(&tree.roots()[0].replies), vec![3]);
        assert!(tree.remove(CommentId(2)).is_none());
    }

    #[test]
    fn annotates_replies_to_replies() {
        let tree = sample();
        let replies = &tree.roots()[0].replies;
        assert_eq!(tree.reply_annotation(&replies[0]), None);
        assert_eq!(
            tree.reply_annotation(&replies[1]).as_deref(),
            Some("replying to @user2")
        );
    }
}
