use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use uuid::Uuid;

/// In-process registry of users who currently have the matching modal open,
/// keyed by scheduled session. Advisory only: it feeds the "partner is also
/// waiting" hint and never gates pairing. State dies with the process.
///
/// The lock is never held across an await point.
#[derive(Default)]
pub struct PresenceTracker {
    sessions: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, user_id: Uuid, scheduled_session_id: Uuid) {
        let mut sessions = self.sessions.write().unwrap();
        sessions.entry(scheduled_session_id).or_default().insert(user_id);
    }

    pub fn set_inactive(&self, user_id: Uuid, scheduled_session_id: Uuid) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(users) = sessions.get_mut(&scheduled_session_id) {
            users.remove(&user_id);
            if users.is_empty() {
                sessions.remove(&scheduled_session_id);
            }
        }
    }

    /// Connection loss: drop the user from every session set.
    pub fn clear_user(&self, user_id: Uuid) {
        let mut sessions = self.sessions.write().unwrap();
        sessions.retain(|_, users| {
            users.remove(&user_id);
            !users.is_empty()
        });
    }

    /// How many users besides `user_id` are waiting on this session.
    pub fn others_active(&self, scheduled_session_id: Uuid, user_id: Uuid) -> usize {
        let sessions = self.sessions.read().unwrap();
        sessions
            .get(&scheduled_session_id)
            .map(|users| users.iter().filter(|u| **u != user_id).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_open_and_close() {
        let tracker = PresenceTracker::new();
        let session = Uuid::now_v7();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        assert_eq!(tracker.others_active(session, a), 0);

        tracker.set_active(a, session);
        tracker.set_active(b, session);
        assert_eq!(tracker.others_active(session, a), 1);
        assert_eq!(tracker.others_active(session, b), 1);

        tracker.set_inactive(b, session);
        assert_eq!(tracker.others_active(session, a), 0);
    }

    #[test]
    fn operations_on_unknown_ids_are_noops() {
        let tracker = PresenceTracker::new();
        let session = Uuid::now_v7();
        let user = Uuid::now_v7();

        tracker.set_inactive(user, session);
        tracker.clear_user(user);
        assert_eq!(tracker.others_active(session, user), 0);
    }

    #[test]
    fn set_active_is_idempotent() {
        let tracker = PresenceTracker::new();
        let session = Uuid::now_v7();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        tracker.set_active(a, session);
        tracker.set_active(a, session);
        assert_eq!(tracker.others_active(session, b), 1);
    }

    #[test]
    fn clear_user_spans_all_sessions() {
        let tracker = PresenceTracker::new();
        let (s1, s2) = (Uuid::now_v7(), Uuid::now_v7());
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        tracker.set_active(a, s1);
        tracker.set_active(a, s2);
        tracker.set_active(b, s1);

        tracker.clear_user(a);
        assert_eq!(tracker.others_active(s1, b), 0);
        assert_eq!(tracker.others_active(s2, b), 0);
        assert_eq!(tracker.others_active(s1, a), 1);
    }

    #[test]
    fn concurrent_mutation_keeps_sets_consistent() {
        use std::sync::Arc;

        let tracker = Arc::new(PresenceTracker::new());
        let session = Uuid::now_v7();
        let users: Vec<Uuid> = (0..16).map(|_| Uuid::now_v7()).collect();

        let handles: Vec<_> = users
            .iter()
            .map(|&u| {
                let t = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        t.set_active(u, session);
                        t.set_inactive(u, session);
                    }
                    t.set_active(u, session);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(tracker.others_active(session, users[0]), users.len() - 1);
    }
}
