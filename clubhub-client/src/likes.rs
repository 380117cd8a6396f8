use crate::api::{LikeToggled, LikeUpdate, UserId};

/// Like pip and counter of a post, as seen by the current viewer
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LikeState {
    pub is_liked: bool,
    pub like_count: u64,

    /// Values from before the toggle currently awaiting the server
    in_flight: Option<(bool, u64)>,
}

impl LikeState {
    pub fn new(is_liked: bool, like_count: u64) -> LikeState {
        LikeState {
            is_liked,
            like_count,
            in_flight: None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Optimistically flips the like, returning false without changing
    /// anything if a toggle is already in flight
    pub fn begin_toggle(&mut self) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.in_flight = Some((self.is_liked, self.like_count));
        self.is_liked = !self.is_liked;
        self.like_count = match self.is_liked {
            true => self.like_count.saturating_add(1),
            false => self.like_count.saturating_sub(1),
        };
        true
    }

    /// Settles the in-flight toggle on the server's answer
    pub fn reconcile(&mut self, answer: LikeToggled) {
        self.in_flight = None;
        self.is_liked = answer.liked;
        self.like_count = answer.count;
    }

    /// Restores the values from before the in-flight toggle
    pub fn rollback(&mut self) {
        if let Some((is_liked, like_count)) = self.in_flight.take() {
            self.is_liked = is_liked;
            self.like_count = like_count;
        }
    }

    /// Applies a `LIKE_UPDATE` from the push channel
    ///
    /// The count always follows the server. The pip only follows updates made
    /// by the viewer themself, eg. from another device.
    pub fn apply_remote(&mut self, viewer: Option<UserId>, update: &LikeUpdate) {
        self.like_count = update.total_likes;
        if viewer == Some(update.user_id) {
            self.is_liked = update.liked;
        }
    }

    /// Applies the answer of the like status query, unless a toggle is
    /// pending, in which case the toggle's answer will settle it
    pub fn apply_status(&mut self, liked: bool) {
        if self.in_flight.is_none() {
            self.is_liked = liked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PostId;

    const VIEWER: UserId = UserId(7);

    fn update(user: i64, liked: bool, total_likes: u64) -> LikeUpdate {
        LikeUpdate {
            post_id: PostId(1),
            user_id: UserId(user),
            liked,
            total_likes,
        }
    }

    #[test]
    fn toggle_rolls_back_on_failure() {
        let mut l = LikeState::new(false, 10);
        assert!(l.begin_toggle());
        assert_eq!((l.is_liked, l.like_count), (true, 11));
        l.rollback();
        assert_eq!(l, LikeState::new(false, 10));
    }

    #[test]
    fn toggle_reconciles_with_server() {
        let mut l = LikeState::new(true, 3);
        assert!(l.begin_toggle());
        assert_eq!((l.is_liked, l.like_count), (false, 2));
        l.reconcile(LikeToggled {
            liked: false,
            count: 5,
        });
        assert_eq!(l, LikeState::new(false, 5));
    }

    #[test]
    fn second_toggle_is_refused_while_in_flight() {
        let mut l = LikeState::new(false, 0);
        assert!(l.begin_toggle());
        assert!(!l.begin_toggle());
        assert_eq!((l.is_liked, l.like_count), (true, 1));
        assert!(l.is_in_flight());
    }

    #[test]
    fn unliking_never_underflows() {
        let mut l = LikeState::new(true, 0);
        assert!(l.begin_toggle());
        assert_eq!(l.like_count, 0);
    }

    #[test]
    fn remote_updates_from_the_viewer_move_the_pip() {
        let mut l = LikeState::new(false, 10);
        l.apply_remote(Some(VIEWER), &update(VIEWER.0, true, 11));
        assert_eq!((l.is_liked, l.like_count), (true, 11));
        l.apply_remote(Some(VIEWER), &update(8, true, 12));
        assert_eq!((l.is_liked, l.like_count), (true, 12));
        l.apply_remote(None, &update(VIEWER.0, false, 11));
        assert_eq!((l.is_liked, l.like_count), (true, 11));
    }

    #[test]
    fn status_does_not_fight_a_pending_toggle() {
        let mut l = LikeState::new(false, 1);
        l.apply_status(true);
        assert!(l.is_liked);
        assert!(l.begin_toggle());
        l.apply_status(true);
        assert!(!l.is_liked);
    }
}
