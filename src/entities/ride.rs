use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::entities::{MemberSummary, Role};
use crate::error::{invalid_input_error, invalid_state_error, invalid_transition_error, Error};

/// Every fifth completed ride earns the passenger this multiplier on the next booking.
const LOYALTY_MULTIPLIER: f64 = 0.7;
const LOYALTY_INTERVAL: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Requested,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    /// Statuses in which a ride ties up its passenger.
    pub const ACTIVE: [Status; 3] = [Self::Requested, Self::Accepted, Self::InProgress];

    /// Statuses in which a ride ties up its driver.
    pub const ENGAGED: [Status; 2] = [Self::Accepted, Self::InProgress];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn successors(&self) -> &'static [Status] {
        match self {
            Self::Requested => &[Self::Accepted, Self::Cancelled],
            Self::Accepted => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: Status) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_engaged(&self) -> bool {
        Self::ENGAGED.contains(self)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(Self::Requested),
            "accepted" => Ok(Self::Accepted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(invalid_input_error("Invalid status provided")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideType {
    Bike,
    Car,
    Rickshaw,
}

impl RideType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bike => "bike",
            Self::Car => "car",
            Self::Rickshaw => "rickshaw",
        }
    }

    /// Fare per kilometre.
    pub fn base_rate(&self) -> f64 {
        match self {
            Self::Bike => 15.0,
            Self::Rickshaw => 20.0,
            Self::Car => 30.0,
        }
    }

    pub fn estimate_fare(&self, distance_km: f64) -> f64 {
        round_to(self.base_rate() * distance_km, 2)
    }
}

impl fmt::Display for RideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RideType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bike" => Ok(Self::Bike),
            "car" => Ok(Self::Car),
            "rickshaw" => Ok(Self::Rickshaw),
            _ => Err(invalid_input_error("Invalid ride type")),
        }
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn loyalty_discount(fare: f64, completed_rides: i64) -> Option<f64> {
    match completed_rides > 0 && completed_rides % LOYALTY_INTERVAL == 0 {
        true => Some(round_to(fare * LOYALTY_MULTIPLIER, 2)),
        false => None,
    }
}

/// A booking as submitted by a passenger, before validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub pickup_location: Option<String>,
    pub drop_location: Option<String>,
    pub ride_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub distance_km: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fare: Option<f64>,
}

/// Accepts numbers and numeric strings. Anything else that is present reads as
/// NaN so validation reports it as a bad amount rather than a missing one.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let number = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
        Some(_) => Some(f64::NAN),
    };

    Ok(number)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Booking {
    pub pickup_location: String,
    pub drop_location: String,
    pub ride_type: RideType,
    pub distance_km: f64,
    pub fare: f64,
}

impl BookingRequest {
    pub fn validate(self) -> Result<Booking, Error> {
        let pickup_location = non_empty(self.pickup_location);
        let drop_location = non_empty(self.drop_location);
        let ride_type = non_empty(self.ride_type);
        let distance_km = self.distance_km.filter(|d| *d != 0.0);
        let fare = self.fare.filter(|f| *f != 0.0);

        let (pickup_location, drop_location, ride_type, distance_km, fare) =
            match (pickup_location, drop_location, ride_type, distance_km, fare) {
                (Some(p), Some(d), Some(t), Some(km), Some(f)) => (p, d, t, km, f),
                _ => return Err(invalid_input_error("Missing required fields")),
            };

        if !distance_km.is_finite() || distance_km < 0.0 || !fare.is_finite() || fare < 0.0 {
            return Err(invalid_input_error("Distance and fare must be positive"));
        }

        Ok(Booking {
            pickup_location,
            drop_location,
            ride_type: ride_type.parse()?,
            distance_km,
            fare,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup_location: String,
    pub drop_location: String,
    pub distance_km: f64,
    pub ride_type: RideType,
    pub fare: f64,
    pub discounted_fare: Option<f64>,
    pub status: Status,
    pub cancelled_by: Option<Role>,
    pub requested_at: DateTime<Utc>,
    pub rating: Option<u8>,
}

impl PolarClass for Ride {
    fn get_polar_class_builder() -> oso::ClassBuilder<Ride> {
        oso::Class::builder()
            .name("Ride")
            .add_attribute_getter("passenger_id", |recv: &Ride| recv.passenger_id.to_string())
            .add_attribute_getter("driver_id", |recv: &Ride| {
                recv.driver_id.map(|id| id.to_string()).unwrap_or_default()
            })
            .add_attribute_getter("status", |recv: &Ride| recv.status.name().to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Ride::get_polar_class_builder();
        builder.build()
    }
}

impl Ride {
    pub fn new(passenger_id: Uuid, booking: Booking, discounted_fare: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            passenger_id,
            driver_id: None,
            pickup_location: booking.pickup_location,
            drop_location: booking.drop_location,
            distance_km: booking.distance_km,
            ride_type: booking.ride_type,
            fare: booking.fare,
            discounted_fare: discounted_fare.filter(|discounted| *discounted <= booking.fare),
            status: Status::Requested,
            cancelled_by: None,
            requested_at: Utc::now(),
            rating: None,
        }
    }

    /// What the driver earns for the ride.
    pub fn earnings(&self) -> f64 {
        self.discounted_fare.unwrap_or(self.fare)
    }

    pub fn ensure_available(&self) -> Result<(), Error> {
        if self.status != Status::Requested {
            return Err(invalid_state_error("This ride is no longer available"));
        }

        if self.driver_id.is_some() {
            return Err(invalid_state_error(
                "This ride has already been accepted by another driver",
            ));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(ride_id = %self.id))]
    pub fn transition(&mut self, next: Status) -> Result<(), Error> {
        if !self.status.can_transition_to(next) {
            return Err(invalid_transition_error(self.status, next));
        }

        self.status = next;
        Ok(())
    }

    pub fn accept(&mut self, driver_id: Uuid) -> Result<(), Error> {
        self.ensure_available()?;
        self.transition(Status::Accepted)?;
        self.driver_id = Some(driver_id);

        Ok(())
    }

    pub fn update_status(&mut self, next: Status, by: Role) -> Result<(), Error> {
        if next == Status::Requested {
            return Err(invalid_input_error("Invalid status provided"));
        }

        self.transition(next)?;

        if next == Status::Cancelled {
            self.cancelled_by = Some(by);
        }

        Ok(())
    }

    pub fn cancel(&mut self, by: Role) -> Result<(), Error> {
        match self.status {
            Status::Completed => Err(invalid_state_error("Cannot cancel a completed ride")),
            Status::Cancelled => Err(invalid_state_error("Ride is already cancelled")),
            _ => {
                self.transition(Status::Cancelled)?;
                self.cancelled_by = Some(by);
                Ok(())
            }
        }
    }

    pub fn rate(&mut self, rating: i64) -> Result<(), Error> {
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| invalid_input_error("Rating must be a whole number from 1 to 5"))?;

        if self.status != Status::Completed {
            return Err(invalid_state_error("Only completed rides can be rated"));
        }

        if self.rating.is_some() {
            return Err(invalid_state_error("This ride has already been rated"));
        }

        self.rating = Some(rating);
        Ok(())
    }
}

/// The values a conditional update expects to find in the stored ride.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RideGuard {
    pub status: Status,
    pub driver_id: Option<Uuid>,
    pub rating: Option<u8>,
}

impl From<&Ride> for RideGuard {
    fn from(ride: &Ride) -> Self {
        Self {
            status: ride.status,
            driver_id: ride.driver_id,
            rating: ride.rating,
        }
    }
}

impl RideGuard {
    pub fn matches(&self, ride: &Ride) -> bool {
        self.status == ride.status && self.driver_id == ride.driver_id && self.rating == ride.rating
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideDetails {
    #[serde(flatten)]
    pub ride: Ride,
    pub passenger: Option<MemberSummary>,
    pub driver: Option<MemberSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ride_type_round_trips_through_its_name() {
        for ride_type in [RideType::Bike, RideType::Car, RideType::Rickshaw] {
            assert_eq!(ride_type.to_string().parse::<RideType>().unwrap(), ride_type);
        }
    }

    #[test]
    fn booking_request_reads_numeric_strings() {
        let request: BookingRequest = serde_json::from_value(serde_json::json!({
            "pickupLocation": "A",
            "dropLocation": "B",
            "rideType": "car",
            "distanceKm": "5",
            "fare": 120,
        }))
        .unwrap();

        assert_eq!(request.distance_km, Some(5.0));
        assert_eq!(request.fare, Some(120.0));

        let booking = request.validate().unwrap();
        assert_eq!(booking.distance_km, 5.0);
    }

    #[test]
    fn booking_request_flags_garbage_amounts() {
        let request: BookingRequest = serde_json::from_value(serde_json::json!({
            "pickupLocation": "A",
            "dropLocation": "B",
            "rideType": "car",
            "distanceKm": "far",
            "fare": [1],
        }))
        .unwrap();

        let err = request.validate().unwrap_err();
        assert_eq!(err.message, "Distance and fare must be positive");

        let request: BookingRequest =
            serde_json::from_value(serde_json::json!({ "pickupLocation": "A" })).unwrap();
        assert_eq!(request.distance_km, None);
        assert_eq!(request.validate().unwrap_err().message, "Missing required fields");
    }

    fn booking() -> Booking {
        Booking {
            pickup_location: "A".into(),
            drop_location: "B".into(),
            ride_type: RideType::Car,
            distance_km: 5.0,
            fare: 80.0,
        }
    }

    #[test]
    fn transition_table() {
        use Status::*;

        let all = [Requested, Accepted, InProgress, Completed, Cancelled];
        let allowed = [
            (Requested, Accepted),
            (Requested, Cancelled),
            (Accepted, InProgress),
            (Accepted, Cancelled),
            (InProgress, Completed),
            (InProgress, Cancelled),
        ];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }

        assert!(Completed.successors().is_empty());
        assert!(Cancelled.successors().is_empty());
    }

    #[test]
    fn new_ride_is_requested_without_driver() {
        let ride = Ride::new(Uuid::new_v4(), booking(), None);

        assert_eq!(ride.status, Status::Requested);
        assert_eq!(ride.driver_id, None);
        assert_eq!(ride.fare, 80.0);
    }

    #[test]
    fn rejected_transition_leaves_ride_untouched() {
        let mut ride = Ride::new(Uuid::new_v4(), booking(), None);

        let err = ride.update_status(Status::Completed, Role::Driver).unwrap_err();

        assert_eq!(err.message, "Cannot transition from requested to completed");
        assert_eq!(ride.status, Status::Requested);
        assert_eq!(ride.cancelled_by, None);
    }

    #[test]
    fn accept_sets_driver_once() {
        let driver_id = Uuid::new_v4();
        let mut ride = Ride::new(Uuid::new_v4(), booking(), None);

        ride.accept(driver_id).unwrap();
        assert_eq!(ride.status, Status::Accepted);
        assert_eq!(ride.driver_id, Some(driver_id));

        let err = ride.accept(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.message, "This ride is no longer available");
        assert_eq!(ride.driver_id, Some(driver_id));
    }

    #[test]
    fn driver_cancellation_through_status_update_records_driver() {
        let mut ride = Ride::new(Uuid::new_v4(), booking(), None);
        ride.accept(Uuid::new_v4()).unwrap();

        ride.update_status(Status::Cancelled, Role::Driver).unwrap();

        assert_eq!(ride.status, Status::Cancelled);
        assert_eq!(ride.cancelled_by, Some(Role::Driver));
    }

    #[test]
    fn cancel_rejects_terminal_rides() {
        let mut ride = Ride::new(Uuid::new_v4(), booking(), None);
        ride.cancel(Role::Passenger).unwrap();
        assert_eq!(ride.cancelled_by, Some(Role::Passenger));

        let err = ride.cancel(Role::Passenger).unwrap_err();
        assert_eq!(err.message, "Ride is already cancelled");

        let mut ride = Ride::new(Uuid::new_v4(), booking(), None);
        ride.accept(Uuid::new_v4()).unwrap();
        ride.transition(Status::InProgress).unwrap();
        ride.transition(Status::Completed).unwrap();

        let err = ride.cancel(Role::Driver).unwrap_err();
        assert_eq!(err.message, "Cannot cancel a completed ride");
        assert_eq!(ride.cancelled_by, None);
    }

    #[test]
    fn rating_is_bounded_and_single() {
        let mut ride = Ride::new(Uuid::new_v4(), booking(), None);
        assert_eq!(
            ride.rate(4).unwrap_err().message,
            "Only completed rides can be rated"
        );

        ride.status = Status::Completed;
        assert!(ride.rate(0).is_err());
        assert!(ride.rate(6).is_err());
        assert!(ride.rate(-1).is_err());

        ride.rate(5).unwrap();
        assert_eq!(ride.rating, Some(5));
        assert_eq!(
            ride.rate(3).unwrap_err().message,
            "This ride has already been rated"
        );
    }

    #[test]
    fn booking_validation() {
        let request = BookingRequest {
            pickup_location: Some(" A ".into()),
            drop_location: Some("B".into()),
            ride_type: Some("car".into()),
            distance_km: Some(5.0),
            fare: Some(80.0),
        };
        assert_eq!(request.clone().validate().unwrap(), booking());

        let missing = BookingRequest {
            drop_location: Some("  ".into()),
            ..request.clone()
        };
        assert_eq!(
            missing.validate().unwrap_err().message,
            "Missing required fields"
        );

        let negative = BookingRequest {
            fare: Some(-3.0),
            ..request.clone()
        };
        assert_eq!(
            negative.validate().unwrap_err().message,
            "Distance and fare must be positive"
        );

        let unknown = BookingRequest {
            ride_type: Some("helicopter".into()),
            ..request
        };
        assert_eq!(unknown.validate().unwrap_err().message, "Invalid ride type");
    }

    #[test]
    fn fares_and_discounts() {
        assert_eq!(RideType::Bike.estimate_fare(3.0), 45.0);
        assert_eq!(RideType::Rickshaw.estimate_fare(2.5), 50.0);
        assert_eq!(RideType::Car.estimate_fare(1.234), 37.02);

        assert_eq!(loyalty_discount(100.0, 0), None);
        assert_eq!(loyalty_discount(100.0, 4), None);
        assert_eq!(loyalty_discount(100.0, 5), Some(70.0));
        assert_eq!(loyalty_discount(100.0, 10), Some(70.0));
    }

    #[test]
    fn details_flatten_ride_fields() {
        let ride = Ride::new(Uuid::new_v4(), booking(), Some(56.0));
        let details = RideDetails {
            ride,
            passenger: None,
            driver: None,
        };

        let value = serde_json::to_value(&details).unwrap();

        assert_eq!(value["status"], "requested");
        assert_eq!(value["rideType"], "car");
        assert_eq!(value["discountedFare"], 56.0);
        assert!(value["driverId"].is_null());
        assert!(value["passenger"].is_null());
    }
}
