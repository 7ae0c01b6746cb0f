//! Group id to session lookup shared by every incoming event

use crate::session::{Session, SessionHandle};
use log::debug;
use shared::GroupId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Lazily populated map of sessions.
///
/// The lock only guards the map itself. Game logic runs under each
/// session's own mutex, so groups never wait on one another. Entries are
/// never removed; a finished session is reset and reused.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<GroupId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, group_id: GroupId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&group_id).cloned()
    }

    /// Returns the session for `group_id`, creating an inactive one on
    /// first reference
    pub async fn get_or_create(&self, group_id: GroupId) -> SessionHandle {
        if let Some(handle) = self.get(group_id).await {
            return handle;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(group_id)
            .or_insert_with(|| {
                debug!("Group {}: session created", group_id);
                Arc::new(Mutex::new(Session::new(group_id)))
            })
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Groups with a session, in no particular order
    pub async fn groups(&self) -> Vec<GroupId> {
        self.sessions.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_is_lazy() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty().await);
        assert!(registry.get(1).await.is_none());

        let handle = registry.get_or_create(1).await;
        assert_eq!(registry.len().await, 1);

        let session = handle.lock().await;
        assert_eq!(session.group_id(), 1);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_same_group_same_session() {
        let registry = SessionRegistry::new();
        let first = registry.get_or_create(7).await;
        let second = registry.get_or_create(7).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_creation_yields_one_session_per_group() {
        let registry = Arc::new(SessionRegistry::new());
        let mut tasks = Vec::new();

        for i in 0..64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.get_or_create(i % 4).await
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(registry.len().await, 4);
        for handle in &handles {
            let group_id = handle.lock().await.group_id();
            let canonical = registry.get(group_id).await.unwrap();
            assert!(Arc::ptr_eq(handle, &canonical));
        }

        let mut groups = registry.groups().await;
        groups.sort_unstable();
        assert_eq!(groups, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create(1).await;
        let b = registry.get_or_create(2).await;

        a.lock().await.activate(10).unwrap();

        assert!(a.lock().await.is_active());
        assert!(!b.lock().await.is_active());
    }
}
