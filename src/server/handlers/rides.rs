use axum::extract::{Extension, Json};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::entities::{BookingRequest, DriverStats, RideDetails};
use crate::error::Error;
use crate::server::extract::{Params, Payload, RideId};
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareParams {
    ride_type: Option<String>,
    distance_km: Option<f64>,
}

#[derive(Default, Serialize, Deserialize)]
pub struct StatusParams {
    status: Option<String>,
}

#[derive(Default, Serialize, Deserialize)]
pub struct RateParams {
    rating: Option<i64>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    utc_offset_minutes: Option<String>,
}

#[derive(Serialize)]
pub struct RideResponse {
    message: &'static str,
    ride: RideDetails,
}

#[derive(Serialize)]
pub struct FoundResponse {
    ride: RideDetails,
}

#[derive(Serialize)]
pub struct RidesResponse {
    rides: Vec<RideDetails>,
}

#[derive(Serialize)]
pub struct FareResponse {
    fare: f64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    stats: DriverStats,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

fn ride_response(message: &'static str, ride: RideDetails) -> Json<RideResponse> {
    RideResponse { message, ride }.into()
}

pub async fn book(
    Extension(api): Extension<DynAPI>,
    user: User,
    Payload(params): Payload<BookingRequest>,
) -> Result<(StatusCode, Json<RideResponse>), Error> {
    let ride = api.book_ride(user, params).await?;

    Ok((
        StatusCode::CREATED,
        ride_response("Ride booked successfully", ride),
    ))
}

pub async fn estimate_fare(
    Extension(api): Extension<DynAPI>,
    user: User,
    Params(params): Params<FareParams>,
) -> Result<Json<FareResponse>, Error> {
    let fare = api
        .estimate_fare(user, params.ride_type, params.distance_km)
        .await?;

    Ok(FareResponse { fare }.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    RideId(id): RideId,
) -> Result<Json<FoundResponse>, Error> {
    let ride = api.find_ride(user, id).await?;

    Ok(FoundResponse { ride }.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<RidesResponse>, Error> {
    let rides = api.list_rides(user).await?;

    Ok(RidesResponse { rides }.into())
}

pub async fn list_available(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<RidesResponse>, Error> {
    let rides = api.list_available_rides(user).await?;

    Ok(RidesResponse { rides }.into())
}

pub async fn list_passenger(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<RidesResponse>, Error> {
    let rides = api.list_passenger_rides(user).await?;

    Ok(RidesResponse { rides }.into())
}

pub async fn list_driver(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<RidesResponse>, Error> {
    let rides = api.list_driver_rides(user).await?;

    Ok(RidesResponse { rides }.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    RideId(id): RideId,
) -> Result<Json<RideResponse>, Error> {
    let ride = api.accept_ride(user, id).await?;

    Ok(ride_response("Ride accepted successfully", ride))
}

pub async fn reject(
    Extension(api): Extension<DynAPI>,
    user: User,
    RideId(id): RideId,
) -> Result<Json<MessageResponse>, Error> {
    api.reject_ride(user, id).await?;

    Ok(MessageResponse {
        message: "Ride rejected successfully",
    }
    .into())
}

pub async fn update_status(
    Extension(api): Extension<DynAPI>,
    user: User,
    RideId(id): RideId,
    Payload(params): Payload<StatusParams>,
) -> Result<Json<RideResponse>, Error> {
    let ride = api.update_ride_status(user, id, params.status).await?;

    Ok(ride_response("Ride status updated successfully", ride))
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    user: User,
    RideId(id): RideId,
) -> Result<Json<RideResponse>, Error> {
    let ride = api.cancel_ride(user, id).await?;

    Ok(ride_response("Ride cancelled successfully", ride))
}

pub async fn rate(
    Extension(api): Extension<DynAPI>,
    user: User,
    RideId(id): RideId,
    Payload(params): Payload<RateParams>,
) -> Result<Json<RideResponse>, Error> {
    let ride = api.rate_ride(user, id, params.rating).await?;

    Ok(ride_response("Ride rated successfully", ride))
}

pub async fn driver_stats(
    Extension(api): Extension<DynAPI>,
    user: User,
    Params(params): Params<StatsParams>,
) -> Result<Json<StatsResponse>, Error> {
    let stats = api.driver_stats(user, params.utc_offset_minutes).await?;

    Ok(StatsResponse { stats }.into())
}
