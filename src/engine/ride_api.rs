use async_trait::async_trait;
use chrono::{Local, Offset, Utc};
use uuid::Uuid;

use super::Engine;

use crate::{
    api::RideAPI,
    auth::{Platform, User},
    db::RideFilter,
    entities::{
        day_containing, loyalty_discount, utc_offset, BookingRequest, DriverStats, Ride,
        RideDetails, RideGuard, RideType, Status,
    },
    error::{invalid_input_error, invalid_state_error, Error},
};

/// Page size of the available-rides listing.
const AVAILABLE_PAGE_SIZE: i64 = 10;

const NO_LONGER_AVAILABLE: &str = "This ride is no longer available";
const RIDE_CHANGED: &str = "This ride was updated by someone else, please retry";

#[async_trait]
impl RideAPI for Engine {
    #[tracing::instrument(skip(self, request), fields(user_id = %user.id))]
    async fn book_ride(&self, user: User, request: BookingRequest) -> Result<RideDetails, Error> {
        self.authorize(
            user.clone(),
            "book",
            Platform::default(),
            "Only passengers can book rides",
        )?;

        let booking = request.validate()?;

        let active_filter = RideFilter::passenger(user.id).statuses(&Status::ACTIVE);
        if self.store.count_rides(&active_filter).await? > 0 {
            tracing::info!("passenger already has an active ride");
            return Err(invalid_state_error(
                "You already have an active ride. Please complete or cancel it first.",
            ));
        }

        let completed_filter = RideFilter::passenger(user.id).statuses(&[Status::Completed]);
        let completed_rides = self.store.count_rides(&completed_filter).await?;
        let discounted_fare = loyalty_discount(booking.fare, completed_rides);

        let ride = Ride::new(user.id, booking, discounted_fare);
        self.store.insert_ride(&ride).await?;

        tracing::info!(
            ride_id = %ride.id,
            ride_type = %ride.ride_type,
            discounted = discounted_fare.is_some(),
            "ride booked"
        );

        self.attach_member(ride).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn estimate_fare(
        &self,
        user: User,
        ride_type: Option<String>,
        distance_km: Option<f64>,
    ) -> Result<f64, Error> {
        self.authorize(
            user.clone(),
            "estimate_fare",
            Platform::default(),
            "You cannot request fare estimates",
        )?;

        let ride_type: RideType = ride_type
            .ok_or_else(|| invalid_input_error("Missing required fields"))?
            .parse()?;

        let distance_km = distance_km
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| invalid_input_error("Distance must be positive"))?;

        Ok(ride_type.estimate_fare(distance_km))
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn find_ride(&self, user: User, id: Uuid) -> Result<RideDetails, Error> {
        let ride = self.fetch_ride(id).await?;

        self.authorize(
            user.clone(),
            "read",
            ride.clone(),
            "You do not have permission to view this ride",
        )?;

        self.attach_member(ride).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn list_available_rides(&self, user: User) -> Result<Vec<RideDetails>, Error> {
        self.authorize(
            user.clone(),
            "list_available",
            Platform::default(),
            "Only drivers can view available rides",
        )?;

        let filter = RideFilter::unassigned()
            .statuses(&[Status::Requested])
            .limit(AVAILABLE_PAGE_SIZE);
        let rides = self.store.find_rides(&filter).await?;

        self.attach_members(rides).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn accept_ride(&self, user: User, id: Uuid) -> Result<RideDetails, Error> {
        self.authorize(
            user.clone(),
            "accept",
            Platform::default(),
            "Only drivers can accept rides",
        )?;

        let engaged_filter = RideFilter::driver(user.id).statuses(&Status::ENGAGED);
        if self.store.count_rides(&engaged_filter).await? > 0 {
            tracing::info!("driver already has an active ride");
            return Err(invalid_state_error(
                "You already have an active ride. Please complete it first.",
            ));
        }

        let mut ride = self.fetch_ride(id).await?;
        let guard = RideGuard::from(&ride);

        ride.accept(user.id)?;

        // keyed on status = requested and no driver, so a concurrent accept loses here
        self.commit_ride(&ride, guard, NO_LONGER_AVAILABLE).await?;

        tracing::info!(ride_id = %ride.id, "ride accepted");

        self.attach_member(ride).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn reject_ride(&self, user: User, id: Uuid) -> Result<(), Error> {
        self.authorize(
            user.clone(),
            "reject",
            Platform::default(),
            "Only drivers can reject rides",
        )?;

        let ride = self.fetch_ride(id).await?;

        if ride.status != Status::Requested {
            return Err(invalid_state_error(NO_LONGER_AVAILABLE));
        }

        tracing::info!(ride_id = %ride.id, "ride rejected");

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn update_ride_status(
        &self,
        user: User,
        id: Uuid,
        status: Option<String>,
    ) -> Result<RideDetails, Error> {
        self.authorize(
            user.clone(),
            "update_status",
            Platform::default(),
            "Only drivers can update ride status",
        )?;

        let next: Status = status
            .ok_or_else(|| invalid_input_error("Invalid status provided"))?
            .parse()?;

        if next == Status::Requested {
            return Err(invalid_input_error("Invalid status provided"));
        }

        let mut ride = self.fetch_ride(id).await?;

        self.authorize(
            user.clone(),
            "update_status",
            ride.clone(),
            "You can only update your own rides",
        )?;

        let guard = RideGuard::from(&ride);
        ride.update_status(next, user.role)?;

        self.commit_ride(&ride, guard, RIDE_CHANGED).await?;

        tracing::info!(ride_id = %ride.id, status = %ride.status, "ride status updated");

        self.attach_member(ride).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<RideDetails, Error> {
        let mut ride = self.fetch_ride(id).await?;

        self.authorize(
            user.clone(),
            "cancel",
            ride.clone(),
            "You do not have permission to cancel this ride",
        )?;

        let guard = RideGuard::from(&ride);
        ride.cancel(user.role)?;

        self.commit_ride(&ride, guard, RIDE_CHANGED).await?;

        tracing::info!(ride_id = %ride.id, cancelled_by = %user.role, "ride cancelled");

        self.attach_member(ride).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn rate_ride(
        &self,
        user: User,
        id: Uuid,
        rating: Option<i64>,
    ) -> Result<RideDetails, Error> {
        self.authorize(
            user.clone(),
            "rate",
            Platform::default(),
            "Only passengers can rate rides",
        )?;

        let rating = rating.ok_or_else(|| invalid_input_error("Missing required fields"))?;

        let mut ride = self.fetch_ride(id).await?;

        self.authorize(
            user.clone(),
            "rate",
            ride.clone(),
            "You can only rate your own rides",
        )?;

        let guard = RideGuard::from(&ride);
        ride.rate(rating)?;

        self.commit_ride(&ride, guard, "This ride has already been rated")
            .await?;

        tracing::info!(ride_id = %ride.id, rating, "ride rated");

        self.attach_member(ride).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn list_rides(&self, user: User) -> Result<Vec<RideDetails>, Error> {
        self.authorize(
            user.clone(),
            "list_rides",
            Platform::default(),
            "You cannot view rides",
        )?;

        let rides = self.store.find_rides(&RideFilter::member(user.id)).await?;

        self.attach_members(rides).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn list_passenger_rides(&self, user: User) -> Result<Vec<RideDetails>, Error> {
        self.authorize(
            user.clone(),
            "list_passenger_rides",
            Platform::default(),
            "Only passengers can view their rides",
        )?;

        let rides = self.store.find_rides(&RideFilter::passenger(user.id)).await?;

        self.attach_members(rides).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn list_driver_rides(&self, user: User) -> Result<Vec<RideDetails>, Error> {
        self.authorize(
            user.clone(),
            "list_driver_rides",
            Platform::default(),
            "Only drivers can view their rides",
        )?;

        let rides = self.store.find_rides(&RideFilter::driver(user.id)).await?;

        self.attach_members(rides).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %user.id))]
    async fn driver_stats(
        &self,
        user: User,
        utc_offset_minutes: Option<String>,
    ) -> Result<DriverStats, Error> {
        self.authorize(
            user.clone(),
            "view_stats",
            Platform::default(),
            "Only drivers can view stats",
        )?;

        let offset = match utc_offset_minutes {
            Some(minutes) => {
                let minutes = minutes
                    .trim()
                    .parse()
                    .map_err(|_| invalid_input_error("Invalid UTC offset"))?;
                utc_offset(minutes)?
            }
            None => Local::now().offset().fix(),
        };

        let filter = RideFilter::driver(user.id).statuses(&[Status::Completed]);
        let rides = self.store.find_rides(&filter).await?;

        let today = day_containing(Utc::now(), offset);

        Ok(DriverStats::compute(&rides, &today))
    }
}
