mod helpers;
mod member_api;
mod ride_api;


use std::sync::Arc;

use oso::Oso;

use crate::{
    api::API,
    auth::authorizor,
    db::Store,
    error::{forbidden_error, Error},
};

pub struct Engine {
    store: Arc<dyn Store + Send + Sync>,
    authorizor: Oso,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new<S: Store + Send + Sync + 'static>(store: S) -> Result<Self, Error> {
        Ok(Self {
            store: Arc::new(store),
            authorizor: authorizor::new()?,
        })
    }
}

impl Engine {
    /// Fails with a forbidden error carrying `denial` unless the policy allows
    /// `action` on `resource`.
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
        denial: &str,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        tracing::info!(denial, "authorization denied");

        Err(forbidden_error(denial))
    }
}

impl API for Engine {}
