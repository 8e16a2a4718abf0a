use std::collections::HashMap;
use std::sync::Mutex;

/// Boundary to the user-account system. Consumed during enrichment to keep
/// records for nonexistent users out of the queue entirely.
pub trait AccountResolver: Send + Sync {
    fn exists_user(&self, user_id: i64) -> bool;
    fn is_active(&self, user_id: i64) -> bool;
}

/// Resolver over a fixed user table. Suits embedded deployments and tests;
/// the account map can be mutated at runtime to simulate account deletion.
#[derive(Default)]
pub struct StaticAccounts {
    // user id -> active flag
    users: Mutex<HashMap<i64, bool>>,
}

impl StaticAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user_id: i64, active: bool) {
        self.users
            .lock()
            .expect("accounts mutex poisoned")
            .insert(user_id, active);
    }

    pub fn remove_user(&self, user_id: i64) {
        self.users
            .lock()
            .expect("accounts mutex poisoned")
            .remove(&user_id);
    }
}

impl AccountResolver for StaticAccounts {
    fn exists_user(&self, user_id: i64) -> bool {
        self.users
            .lock()
            .expect("accounts mutex poisoned")
            .contains_key(&user_id)
    }

    fn is_active(&self, user_id: i64) -> bool {
        self.users
            .lock()
            .expect("accounts mutex poisoned")
            .get(&user_id)
            .copied()
            .unwrap_or(false)
    }
}
