//! Signed-in user handle shared by every synchronizer.
//!
//! Authentication itself happens elsewhere; this only carries its result.

use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Arc<RwLock<Option<String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let session = Self::new();
        session.sign_in(user_id);
        session
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        if let Ok(mut user) = self.user.write() {
            *user = Some(user_id.into());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut user) = self.user.write() {
            *user = None;
        }
    }

    /// Current user id; `None` when signed out.
    pub fn current_user(&self) -> Option<String> {
        self.user.read().ok().and_then(|user| user.clone())
    }
}
