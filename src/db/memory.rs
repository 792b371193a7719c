use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RideFilter, Store, ACTIVE_RIDE_CONFLICT, MEMBER_CONFLICT};
use crate::entities::{Member, Ride, RideGuard};
use crate::error::{invalid_state_error, Error};

/// A [`Store`] kept in process memory. All state sits behind one lock, so
/// every operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    members: HashMap<Uuid, Member>,
    sessions: HashMap<Uuid, Uuid>,
    rides: HashMap<Uuid, Ride>,
}

impl State {
    /// Mirrors the partial unique indexes of the Postgres schema.
    fn conflicts(&self, ride: &Ride) -> bool {
        self.rides.values().filter(|other| other.id != ride.id).any(|other| {
            let same_passenger = ride.status.is_active()
                && other.status.is_active()
                && other.passenger_id == ride.passenger_id;

            let same_driver = ride.status.is_engaged()
                && other.status.is_engaged()
                && ride.driver_id.is_some()
                && other.driver_id == ride.driver_id;

            same_passenger || same_driver
        })
    }

    fn matching(&self, filter: &RideFilter) -> Vec<Ride> {
        let mut rides: Vec<Ride> = self
            .rides
            .values()
            .filter(|ride| filter.matches(ride))
            .cloned()
            .collect();

        rides.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        rides
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_member(&self, member: &Member) -> Result<(), Error> {
        let mut state = self.state.lock().await;

        let taken = state
            .members
            .values()
            .any(|other| other.email == member.email || other.phone == member.phone);

        if taken || state.members.contains_key(&member.id) {
            return Err(invalid_state_error(MEMBER_CONFLICT));
        }

        state.members.insert(member.id, member.clone());
        Ok(())
    }

    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, Error> {
        let state = self.state.lock().await;

        Ok(state.members.values().find(|m| m.email == email).cloned())
    }

    async fn find_member_by_phone(&self, phone: &str) -> Result<Option<Member>, Error> {
        let state = self.state.lock().await;

        Ok(state.members.values().find(|m| m.phone == phone).cloned())
    }

    async fn find_members(&self, ids: &[Uuid]) -> Result<Vec<Member>, Error> {
        let state = self.state.lock().await;

        Ok(ids
            .iter()
            .filter_map(|id| state.members.get(id))
            .cloned()
            .collect())
    }

    async fn insert_session(&self, token: Uuid, member_id: Uuid) -> Result<(), Error> {
        let mut state = self.state.lock().await;

        state.sessions.insert(token, member_id);
        Ok(())
    }

    async fn find_session_member(&self, token: Uuid) -> Result<Option<Member>, Error> {
        let state = self.state.lock().await;

        Ok(state
            .sessions
            .get(&token)
            .and_then(|member_id| state.members.get(member_id))
            .cloned())
    }

    async fn insert_ride(&self, ride: &Ride) -> Result<(), Error> {
        let mut state = self.state.lock().await;

        if state.rides.contains_key(&ride.id) || state.conflicts(ride) {
            return Err(invalid_state_error(ACTIVE_RIDE_CONFLICT));
        }

        state.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn find_ride(&self, id: Uuid) -> Result<Option<Ride>, Error> {
        let state = self.state.lock().await;

        Ok(state.rides.get(&id).cloned())
    }

    async fn find_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, Error> {
        let state = self.state.lock().await;
        let mut rides = state.matching(filter);

        if let Some(limit) = filter.limit {
            rides.truncate(usize::try_from(limit).unwrap_or(0));
        }

        Ok(rides)
    }

    async fn count_rides(&self, filter: &RideFilter) -> Result<i64, Error> {
        let state = self.state.lock().await;

        Ok(state.matching(filter).len() as i64)
    }

    async fn update_ride(&self, ride: &Ride, guard: RideGuard) -> Result<bool, Error> {
        let mut state = self.state.lock().await;

        match state.rides.get(&ride.id) {
            Some(current) if guard.matches(current) => {}
            _ => return Ok(false),
        }

        if state.conflicts(ride) {
            return Err(invalid_state_error(ACTIVE_RIDE_CONFLICT));
        }

        state.rides.insert(ride.id, ride.clone());
        Ok(true)
    }
}
