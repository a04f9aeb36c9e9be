use std::fmt::Debug;

use crate::{
    db_types::UssdSession,
    traits::{AllocationDatabase, AllocationError},
};

/// Durable USSD session state. Gateways send one HTTP request per menu step, so the conversation lives in the
/// database between callbacks.
pub struct SessionApi<B> {
    db: B,
}

impl<B> Debug for SessionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionApi")
    }
}

impl<B> SessionApi<B>
where B: AllocationDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetch the session for the given id, or a fresh menu-stage session if this is the first callback.
    pub async fn fetch(&self, session_id: &str) -> Result<UssdSession, AllocationError> {
        self.db.fetch_session(session_id).await
    }

    pub async fn save(&self, session: &UssdSession) -> Result<(), AllocationError> {
        self.db.save_session(session).await
    }

    pub async fn clear(&self, session_id: &str) -> Result<(), AllocationError> {
        self.db.clear_session(session_id).await
    }
}
