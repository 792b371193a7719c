use std::collections::HashMap;

use uuid::Uuid;

use super::Engine;

use crate::{
    entities::{MemberSummary, Ride, RideDetails, RideGuard},
    error::{invalid_state_error, not_found_error, unexpected_error, Error},
};

impl Engine {
    #[tracing::instrument(skip(self))]
    pub(super) async fn fetch_ride(&self, id: Uuid) -> Result<Ride, Error> {
        self.store
            .find_ride(id)
            .await?
            .ok_or_else(|| not_found_error("Ride not found"))
    }

    /// Writes `ride` only if the stored copy still matches `guard`.
    #[tracing::instrument(skip(self, ride), fields(ride_id = %ride.id, status = %ride.status))]
    pub(super) async fn commit_ride(
        &self,
        ride: &Ride,
        guard: RideGuard,
        conflict: &str,
    ) -> Result<(), Error> {
        if !self.store.update_ride(ride, guard).await? {
            tracing::warn!("ride changed concurrently, update skipped");
            return Err(invalid_state_error(conflict));
        }

        Ok(())
    }

    pub(super) async fn attach_members(&self, rides: Vec<Ride>) -> Result<Vec<RideDetails>, Error> {
        let mut ids: Vec<Uuid> = rides
            .iter()
            .flat_map(|ride| std::iter::once(ride.passenger_id).chain(ride.driver_id))
            .collect();
        ids.sort();
        ids.dedup();

        let members: HashMap<Uuid, MemberSummary> = self
            .store
            .find_members(&ids)
            .await?
            .iter()
            .map(|member| (member.id, MemberSummary::from(member)))
            .collect();

        Ok(rides
            .into_iter()
            .map(|ride| RideDetails {
                passenger: members.get(&ride.passenger_id).cloned(),
                driver: ride.driver_id.and_then(|id| members.get(&id).cloned()),
                ride,
            })
            .collect())
    }

    pub(super) async fn attach_member(&self, ride: Ride) -> Result<RideDetails, Error> {
        self.attach_members(vec![ride])
            .await?
            .pop()
            .ok_or_else(unexpected_error)
    }
}
