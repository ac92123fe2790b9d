use std::fmt;
use std::sync::Arc;

/// Handle to the multiplexed session a tunnel was started on.
///
/// Cloning is cheap and every clone refers to the same session. The handle
/// is non-owning with respect to the session's I/O resources: a tunnel
/// holding one never extends the session's lifetime, and dropping every
/// clone does not tear the session down.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionInner { id: id.into() }),
        }
    }

    /// Identifier assigned by the remote side at session establishment
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Whether two handles refer to the same underlying session
    pub fn same_session(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.inner.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_are_the_same_session() {
        let session = Session::new("sess_1");
        let clone = session.clone();
        assert!(session.same_session(&clone));
        assert_eq!(session.id(), clone.id());
    }

    #[test]
    fn test_distinct_sessions_are_not_identical() {
        // Same id, different establishment: identity is by handle, not name
        let a = Session::new("sess_1");
        let b = Session::new("sess_1");
        assert!(!a.same_session(&b));
    }
}
