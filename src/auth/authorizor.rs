use oso::{Oso, PolarClass};

use crate::auth::{Platform, User};
use crate::entities::Ride;
use crate::error::Error;

pub fn new() -> Result<Oso, Error> {
    let mut o = Oso::new();

    o.register_class(Platform::get_polar_class())?;
    o.register_class(User::get_polar_class())?;
    o.register_class(Ride::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
fn user(role: crate::entities::Role) -> User {
    User {
        id: uuid::Uuid::new_v4(),
        role,
    }
}

#[cfg(test)]
fn ride(passenger_id: uuid::Uuid) -> Ride {
    use crate::entities::{Booking, RideType};

    let booking = Booking {
        pickup_location: "A".into(),
        drop_location: "B".into(),
        ride_type: RideType::Bike,
        distance_km: 2.0,
        fare: 30.0,
    };

    Ride::new(passenger_id, booking, None)
}

#[test]
fn platform_role_test() {
    use crate::entities::Role;

    let authorizor = new().unwrap();

    let passenger = user(Role::Passenger);
    let driver = user(Role::Driver);

    let result = authorizor.query_rule(
        "has_role",
        (passenger.clone(), "passenger", Platform::default()),
    );
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.query_rule("has_role", (passenger.clone(), "driver", Platform::default()));
    assert!(result.unwrap().next().is_none());

    for action in ["book", "rate", "list_passenger_rides"] {
        assert!(authorizor.is_allowed(passenger.clone(), action, Platform::default()).unwrap());
        assert!(!authorizor.is_allowed(driver.clone(), action, Platform::default()).unwrap());
    }

    for action in [
        "list_available",
        "accept",
        "reject",
        "update_status",
        "list_driver_rides",
        "view_stats",
    ] {
        assert!(authorizor.is_allowed(driver.clone(), action, Platform::default()).unwrap());
        assert!(!authorizor.is_allowed(passenger.clone(), action, Platform::default()).unwrap());
    }

    for action in ["list_rides", "estimate_fare"] {
        assert!(authorizor.is_allowed(driver.clone(), action, Platform::default()).unwrap());
        assert!(authorizor.is_allowed(passenger.clone(), action, Platform::default()).unwrap());
    }
}

#[test]
fn ride_passenger_role_test() {
    use crate::entities::Role;

    let authorizor = new().unwrap();

    let passenger = user(Role::Passenger);
    let stranger = user(Role::Passenger);
    let ride = ride(passenger.id);

    let result = authorizor.query_rule("has_role", (passenger.clone(), "passenger", ride.clone()));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.query_rule("has_role", (stranger.clone(), "passenger", ride.clone()));
    assert!(result.unwrap().next().is_none());

    for action in ["read", "cancel", "rate"] {
        assert!(authorizor.is_allowed(passenger.clone(), action, ride.clone()).unwrap());
        assert!(!authorizor.is_allowed(stranger.clone(), action, ride.clone()).unwrap());
    }

    let result = authorizor.is_allowed(passenger.clone(), "update_status", ride.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn ride_driver_role_test() {
    use crate::entities::Role;

    let authorizor = new().unwrap();

    let driver = user(Role::Driver);
    let mut ride = ride(uuid::Uuid::new_v4());

    // before the ride is accepted

    let result = authorizor.query_rule("has_role", (driver.clone(), "driver", ride.clone()));
    assert!(result.unwrap().next().is_none());

    let result = authorizor.is_allowed(driver.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(driver.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(driver.clone(), "update_status", ride.clone());
    assert_eq!(result.unwrap(), false);

    ride.accept(driver.id).unwrap();

    // after the ride is accepted

    let result = authorizor.query_rule("has_role", (driver.clone(), "driver", ride.clone()));
    assert!(result.unwrap().next().unwrap().is_ok());

    for action in ["read", "cancel", "update_status"] {
        assert!(authorizor.is_allowed(driver.clone(), action, ride.clone()).unwrap());
    }

    let result = authorizor.is_allowed(driver.clone(), "rate", ride.clone());
    assert_eq!(result.unwrap(), false);

    let other_driver = user(Role::Driver);
    let result = authorizor.is_allowed(other_driver, "update_status", ride.clone());
    assert_eq!(result.unwrap(), false);
}
