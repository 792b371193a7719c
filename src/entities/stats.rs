use std::ops::Range;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{ride::round_to, Ride, Status};
use crate::error::{invalid_input_error, Error};

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStats {
    pub total_rides: usize,
    pub total_earnings: f64,
    pub average_rating: f64,
    pub today_rides: usize,
    pub today_earnings: f64,
    pub today_average_rating: f64,
}

impl DriverStats {
    /// Aggregates over the completed rides among `rides`; "today" covers rides
    /// requested within `today`.
    pub fn compute(rides: &[Ride], today: &Range<DateTime<Utc>>) -> Self {
        let completed: Vec<&Ride> = rides
            .iter()
            .filter(|ride| ride.status == Status::Completed)
            .collect();

        let todays: Vec<&Ride> = completed
            .iter()
            .copied()
            .filter(|ride| today.contains(&ride.requested_at))
            .collect();

        let (total_rides, total_earnings, average_rating) = aggregate(&completed);
        let (today_rides, today_earnings, today_average_rating) = aggregate(&todays);

        Self {
            total_rides,
            total_earnings,
            average_rating,
            today_rides,
            today_earnings,
            today_average_rating,
        }
    }
}

fn aggregate(rides: &[&Ride]) -> (usize, f64, f64) {
    let earnings: f64 = rides.iter().map(|ride| ride.earnings()).sum();

    let ratings: Vec<f64> = rides
        .iter()
        .filter_map(|ride| ride.rating)
        .map(f64::from)
        .collect();

    let average_rating = match ratings.is_empty() {
        true => 0.0,
        false => ratings.iter().sum::<f64>() / ratings.len() as f64,
    };

    (rides.len(), round_to(earnings, 2), round_to(average_rating, 1))
}

/// Resolves a caller-supplied offset in minutes east of UTC.
pub fn utc_offset(minutes: i32) -> Result<FixedOffset, Error> {
    if !(-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&minutes) {
        return Err(invalid_input_error("Invalid UTC offset"));
    }

    FixedOffset::east_opt(minutes * 60).ok_or_else(|| invalid_input_error("Invalid UTC offset"))
}

/// The calendar day containing `now` in `offset`, as a UTC range.
pub fn day_containing(now: DateTime<Utc>, offset: FixedOffset) -> Range<DateTime<Utc>> {
    let local = now.with_timezone(&offset);
    let midnight = local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now);

    midnight..midnight + Duration::days(1)
}
