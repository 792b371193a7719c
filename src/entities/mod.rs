mod member;
pub mod ride;
mod stats;

pub use member::{Member, MemberSummary, Role, SignUpRequest};
pub use ride::{
    loyalty_discount, Booking, BookingRequest, Ride, RideDetails, RideGuard, RideType, Status,
};
pub use stats::{day_containing, utc_offset, DriverStats};
