use async_trait::async_trait;
use uuid::Uuid;

use super::Engine;

use crate::{
    api::{MemberAPI, SignedUp},
    auth::User,
    entities::SignUpRequest,
    error::{invalid_input_error, unauthenticated_error, Error},
};

#[async_trait]
impl MemberAPI for Engine {
    #[tracing::instrument(skip_all)]
    async fn sign_up(&self, request: SignUpRequest) -> Result<SignedUp, Error> {
        let member = request.validate()?;

        if self.store.find_member_by_email(&member.email).await?.is_some() {
            return Err(invalid_input_error("User already exists with this email"));
        }

        if self.store.find_member_by_phone(&member.phone).await?.is_some() {
            return Err(invalid_input_error(
                "User already exists with this phone number",
            ));
        }

        self.store.insert_member(&member).await?;

        let token = Uuid::new_v4();
        self.store.insert_session(token, member.id).await?;

        tracing::info!(member_id = %member.id, role = %member.role, "member signed up");

        Ok(SignedUp { member, token })
    }

    #[tracing::instrument(skip_all)]
    async fn authenticate(&self, token: Uuid) -> Result<User, Error> {
        let member = self
            .store
            .find_session_member(token)
            .await?
            .ok_or_else(unauthenticated_error)?;

        Ok(User::from(&member))
    }
}
