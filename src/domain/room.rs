use std::cmp::Ordering;
use uuid::Uuid;

/// The participants of a room, normalized so `lo < hi` by UUID byte order.
/// `(a, b)` and `(b, a)` always produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairKey {
    pub(crate) lo: Uuid,
    pub(crate) hi: Uuid,
}

impl PairKey {
    /// Normalizes an unordered pair. Returns `None` when both sides are the
    /// same user; a user cannot open a room with themselves.
    #[must_use]
    pub fn normalize(a: Uuid, b: Uuid) -> Option<Self> {
        match a.cmp(&b) {
            Ordering::Less => Some(Self { lo: a, hi: b }),
            Ordering::Greater => Some(Self { lo: b, hi: a }),
            Ordering::Equal => None,
        }
    }
}

/// Which side of the normalized pair a participant occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSide {
    Lo,
    Hi,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub(crate) id: i64,
    pub(crate) user_lo: Uuid,
    pub(crate) user_hi: Uuid,
    pub(crate) last_message: Option<String>,
    pub(crate) last_message_at: Option<i64>,
    pub(crate) lo_cleared_at: Option<i64>,
    pub(crate) hi_cleared_at: Option<i64>,
    pub(crate) deleted: bool,
    pub(crate) created_at: i64,
}

impl Room {
    #[must_use]
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user_lo == user_id || self.user_hi == user_id
    }

    #[must_use]
    pub fn side_of(&self, user_id: Uuid) -> Option<PairSide> {
        if user_id == self.user_lo {
            Some(PairSide::Lo)
        } else if user_id == self.user_hi {
            Some(PairSide::Hi)
        } else {
            None
        }
    }

    /// The other participant, or `None` when the user is not in the room.
    #[must_use]
    pub fn counterpart_of(&self, user_id: Uuid) -> Option<Uuid> {
        match self.side_of(user_id)? {
            PairSide::Lo => Some(self.user_hi),
            PairSide::Hi => Some(self.user_lo),
        }
    }

    /// The participant's own visibility cutoff. Messages at or before this
    /// instant are hidden from them.
    #[must_use]
    pub fn cleared_at_for(&self, user_id: Uuid) -> Option<i64> {
        match self.side_of(user_id)? {
            PairSide::Lo => self.lo_cleared_at,
            PairSide::Hi => self.hi_cleared_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let forward = PairKey::normalize(a, b).unwrap();
        let backward = PairKey::normalize(b, a).unwrap();

        assert_eq!(forward, backward);
        assert!(forward.lo < forward.hi);
    }

    #[test]
    fn test_pair_key_rejects_self_pair() {
        let a = Uuid::new_v4();
        assert!(PairKey::normalize(a, a).is_none());
    }

    fn room_between(lo: Uuid, hi: Uuid) -> Room {
        Room {
            id: 1,
            user_lo: lo,
            user_hi: hi,
            last_message: None,
            last_message_at: None,
            lo_cleared_at: Some(100),
            hi_cleared_at: None,
            deleted: false,
            created_at: 42,
        }
    }

    #[test]
    fn test_counterpart_and_cutoff_follow_sides() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let key = PairKey::normalize(a, b).unwrap();
        let room = room_between(key.lo, key.hi);

        assert_eq!(room.counterpart_of(key.lo), Some(key.hi));
        assert_eq!(room.counterpart_of(key.hi), Some(key.lo));
        assert_eq!(room.cleared_at_for(key.lo), Some(100));
        assert_eq!(room.cleared_at_for(key.hi), None);

        let stranger = Uuid::new_v4();
        assert_eq!(room.counterpart_of(stranger), None);
        assert!(!room.has_participant(stranger));
    }

}
