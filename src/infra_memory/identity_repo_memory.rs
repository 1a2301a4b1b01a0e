use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Default)]
pub struct MemoryIdentityRepo {
    by_id: DashMap<UserId, Identity>,
    by_email: DashMap<String, UserId>,
}

impl MemoryIdentityRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl IdentityRepo for MemoryIdentityRepo {
    async fn create(&self, identity: &Identity) -> Result<(), AuthError> {
        match self.by_email.entry(identity.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::UserExists),
            Entry::Vacant(slot) => {
                self.by_id.insert(identity.id, identity.clone());
                slot.insert(identity.id);
                Ok(())
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        let Some(user_id) = self.by_email.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.by_id.get(&user_id).map(|identity| identity.clone()))
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<Identity>, AuthError> {
        Ok(self.by_id.get(&user_id).map(|identity| identity.clone()))
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        match self.by_id.get_mut(&user_id) {
            Some(mut identity) => {
                identity.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
