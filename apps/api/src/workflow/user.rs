use chrono::Utc;
use tracing::info;

use super::{StageOutcome, WorkflowError, Workflows};
use crate::entity::user::UserStatus;

impl Workflows {
    /// Marks a freshly registered user as created.
    pub async fn activate_user(&self, user_id: &str) -> Result<StageOutcome, WorkflowError> {
        let mut user = self
            .users
            .get_and_migrate(user_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("users/{user_id}")))?;

        if user.is_created() {
            info!("User {user_id} already created, skipping");
            return Ok(StageOutcome::AlreadyDone);
        }

        user.status = UserStatus::Created;
        user.updated_at = Some(Utc::now());
        let outcome = self.users.update(&user.id, &user).await?;
        info!("User {user_id} activated ({outcome:?})");
        Ok(StageOutcome::Completed)
    }
}
