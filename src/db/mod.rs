mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{Member, Ride, RideGuard, Status};
use crate::error::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub(crate) const ACTIVE_RIDE_CONFLICT: &str = "An active ride already exists for this member";
pub(crate) const MEMBER_CONFLICT: &str = "A user with this email or phone number already exists";

/// Durable storage for members, sessions and rides.
///
/// Rides are never deleted. Every change to an existing ride goes through
/// [`Store::update_ride`], which only writes when the stored ride still matches
/// the guard; implementations must also reject any write that would leave a
/// passenger with two active rides or a driver with two engaged rides.
#[async_trait]
pub trait Store {
    async fn insert_member(&self, member: &Member) -> Result<(), Error>;
    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, Error>;
    async fn find_member_by_phone(&self, phone: &str) -> Result<Option<Member>, Error>;
    async fn find_members(&self, ids: &[Uuid]) -> Result<Vec<Member>, Error>;

    async fn insert_session(&self, token: Uuid, member_id: Uuid) -> Result<(), Error>;
    async fn find_session_member(&self, token: Uuid) -> Result<Option<Member>, Error>;

    async fn insert_ride(&self, ride: &Ride) -> Result<(), Error>;
    async fn find_ride(&self, id: Uuid) -> Result<Option<Ride>, Error>;
    /// Matching rides, newest first.
    async fn find_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, Error>;
    async fn count_rides(&self, filter: &RideFilter) -> Result<i64, Error>;
    /// Returns `false` without writing when the stored ride no longer matches `guard`.
    async fn update_ride(&self, ride: &Ride, guard: RideGuard) -> Result<bool, Error>;
}

#[derive(Clone, Debug, Default)]
pub struct RideFilter {
    pub passenger_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    /// Rides where the member is either the passenger or the driver.
    pub member_id: Option<Uuid>,
    pub unassigned: bool,
    pub statuses: Vec<Status>,
    pub limit: Option<i64>,
}

impl RideFilter {
    pub fn passenger(id: Uuid) -> Self {
        Self {
            passenger_id: Some(id),
            ..Self::default()
        }
    }

    pub fn driver(id: Uuid) -> Self {
        Self {
            driver_id: Some(id),
            ..Self::default()
        }
    }

    pub fn member(id: Uuid) -> Self {
        Self {
            member_id: Some(id),
            ..Self::default()
        }
    }

    pub fn unassigned() -> Self {
        Self {
            unassigned: true,
            ..Self::default()
        }
    }

    pub fn statuses(mut self, statuses: &[Status]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, ride: &Ride) -> bool {
        self.passenger_id.map_or(true, |id| ride.passenger_id == id)
            && self.driver_id.map_or(true, |id| ride.driver_id == Some(id))
            && self
                .member_id
                .map_or(true, |id| ride.passenger_id == id || ride.driver_id == Some(id))
            && (!self.unassigned || ride.driver_id.is_none())
            && (self.statuses.is_empty() || self.statuses.contains(&ride.status))
    }
}
