use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{BookingRequest, DriverStats, Member, RideDetails, SignUpRequest};
use crate::error::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedUp {
    pub member: Member,
    pub token: Uuid,
}

#[async_trait]
pub trait MemberAPI {
    async fn sign_up(&self, request: SignUpRequest) -> Result<SignedUp, Error>;

    /// Resolves a session token to the caller's identity.
    async fn authenticate(&self, token: Uuid) -> Result<User, Error>;
}

#[async_trait]
pub trait RideAPI {
    async fn book_ride(&self, user: User, request: BookingRequest) -> Result<RideDetails, Error>;

    async fn estimate_fare(
        &self,
        user: User,
        ride_type: Option<String>,
        distance_km: Option<f64>,
    ) -> Result<f64, Error>;

    async fn find_ride(&self, user: User, id: Uuid) -> Result<RideDetails, Error>;

    async fn list_available_rides(&self, user: User) -> Result<Vec<RideDetails>, Error>;

    async fn accept_ride(&self, user: User, id: Uuid) -> Result<RideDetails, Error>;

    /// Acknowledges a rejection. Nothing is persisted.
    async fn reject_ride(&self, user: User, id: Uuid) -> Result<(), Error>;

    async fn update_ride_status(
        &self,
        user: User,
        id: Uuid,
        status: Option<String>,
    ) -> Result<RideDetails, Error>;

    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<RideDetails, Error>;

    async fn rate_ride(&self, user: User, id: Uuid, rating: Option<i64>)
        -> Result<RideDetails, Error>;

    async fn list_rides(&self, user: User) -> Result<Vec<RideDetails>, Error>;

    async fn list_passenger_rides(&self, user: User) -> Result<Vec<RideDetails>, Error>;

    async fn list_driver_rides(&self, user: User) -> Result<Vec<RideDetails>, Error>;

    /// `utc_offset_minutes` locates the caller's calendar day; the server's
    /// local offset is used when absent.
    async fn driver_stats(
        &self,
        user: User,
        utc_offset_minutes: Option<String>,
    ) -> Result<DriverStats, Error>;
}

pub trait API: MemberAPI + RideAPI {}
