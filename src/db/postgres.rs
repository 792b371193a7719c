use async_trait::async_trait;
use futures::{future, TryStreamExt};
use sqlx::{
    postgres::PgPoolOptions, types::Json, Executor, Pool, Postgres, QueryBuilder, Row,
};
use uuid::Uuid;

use super::{RideFilter, Store, ACTIVE_RIDE_CONFLICT, MEMBER_CONFLICT};
use crate::entities::{Member, Ride, RideGuard};
use crate::error::{database_error, invalid_state_error, Error};

type Database = Postgres;

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgStore {
    pool: Pool<Database>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::new", skip_all)]
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        // TODO: move this to migrations
        pool.execute("CREATE TABLE IF NOT EXISTS members (id UUID PRIMARY KEY, email VARCHAR NOT NULL UNIQUE, phone VARCHAR NOT NULL UNIQUE, data JSONB NOT NULL)")
            .await?;
        pool.execute("CREATE TABLE IF NOT EXISTS sessions (token UUID PRIMARY KEY, member_id UUID NOT NULL REFERENCES members(id), created_at TIMESTAMPTZ NOT NULL DEFAULT now())")
            .await?;
        pool.execute("CREATE TABLE IF NOT EXISTS rides (id UUID PRIMARY KEY, passenger_id UUID NOT NULL REFERENCES members(id), driver_id UUID REFERENCES members(id), status VARCHAR NOT NULL, requested_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS rides_requested_at ON rides (requested_at DESC)")
            .await?;

        // at most one active ride per passenger and one engaged ride per driver
        pool.execute("CREATE UNIQUE INDEX IF NOT EXISTS rides_active_passenger ON rides (passenger_id) WHERE status IN ('requested', 'accepted', 'in_progress')")
            .await?;
        pool.execute("CREATE UNIQUE INDEX IF NOT EXISTS rides_engaged_driver ON rides (driver_id) WHERE status IN ('accepted', 'in_progress')")
            .await?;

        tracing::info!("connected to postgres");

        Ok(Self { pool })
    }
}

fn conflict_or_database_error(err: sqlx::Error, message: &str) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            tracing::warn!(constraint = ?db_err.constraint(), "unique constraint rejected write");
            return invalid_state_error(message);
        }
    }

    database_error(err)
}

fn push_conditions(query: &mut QueryBuilder<'_, Database>, filter: &RideFilter) {
    if let Some(id) = filter.passenger_id {
        query.push(" AND passenger_id = ").push_bind(id);
    }

    if let Some(id) = filter.driver_id {
        query.push(" AND driver_id = ").push_bind(id);
    }

    if let Some(id) = filter.member_id {
        query
            .push(" AND (passenger_id = ")
            .push_bind(id)
            .push(" OR driver_id = ")
            .push_bind(id)
            .push(")");
    }

    if filter.unassigned {
        query.push(" AND driver_id IS NULL");
    }

    if !filter.statuses.is_empty() {
        let names: Vec<String> = filter
            .statuses
            .iter()
            .map(|status| status.name().to_string())
            .collect();

        query.push(" AND status = ANY(").push_bind(names).push(")");
    }
}

#[async_trait]
impl Store for PgStore {
    #[tracing::instrument(skip(self, member), fields(member_id = %member.id))]
    async fn insert_member(&self, member: &Member) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("INSERT INTO members (id, email, phone, data) VALUES ($1, $2, $3, $4)")
                .bind(&member.id)
                .bind(&member.email)
                .bind(&member.phone)
                .bind(Json(member)),
        )
        .await
        .map_err(|err| conflict_or_database_error(err, MEMBER_CONFLICT))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM members WHERE email = $1").bind(email))
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(member): Json<Member> = result.try_get("data")?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_member_by_phone(&self, phone: &str) -> Result<Option<Member>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM members WHERE phone = $1").bind(phone))
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(member): Json<Member> = result.try_get("data")?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_members(&self, ids: &[Uuid]) -> Result<Vec<Member>, Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.pool.acquire().await?;

        let members: Vec<Member> = conn
            .fetch(sqlx::query("SELECT data FROM members WHERE id = ANY($1)").bind(ids.to_vec()))
            .and_then(|row| future::ready(row.try_get::<Json<Member>, _>("data")))
            .map_ok(|Json(member)| member)
            .try_collect()
            .await?;

        Ok(members)
    }

    #[tracing::instrument(skip(self, token))]
    async fn insert_session(&self, token: Uuid, member_id: Uuid) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("INSERT INTO sessions (token, member_id) VALUES ($1, $2)")
                .bind(&token)
                .bind(&member_id),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn find_session_member(&self, token: Uuid) -> Result<Option<Member>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(
                sqlx::query(
                    "SELECT m.data FROM sessions s JOIN members m ON m.id = s.member_id WHERE s.token = $1",
                )
                .bind(&token),
            )
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(member): Json<Member> = result.try_get("data")?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, ride), fields(ride_id = %ride.id))]
    async fn insert_ride(&self, ride: &Ride) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("INSERT INTO rides (id, passenger_id, driver_id, status, requested_at, data) VALUES ($1, $2, $3, $4, $5, $6)")
                .bind(&ride.id)
                .bind(&ride.passenger_id)
                .bind(&ride.driver_id)
                .bind(ride.status.name())
                .bind(&ride.requested_at)
                .bind(Json(ride)),
        )
        .await
        .map_err(|err| conflict_or_database_error(err, ACTIVE_RIDE_CONFLICT))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, id: Uuid) -> Result<Option<Ride>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&id))
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(ride): Json<Ride> = result.try_get("data")?;
                Ok(Some(ride))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, Error> {
        let mut query = QueryBuilder::<Database>::new("SELECT data FROM rides WHERE TRUE");
        push_conditions(&mut query, filter);
        query.push(" ORDER BY requested_at DESC");

        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let mut conn = self.pool.acquire().await?;

        let rides: Vec<Ride> = conn
            .fetch(query.build())
            .and_then(|row| future::ready(row.try_get::<Json<Ride>, _>("data")))
            .map_ok(|Json(ride)| ride)
            .try_collect()
            .await?;

        Ok(rides)
    }

    #[tracing::instrument(skip(self))]
    async fn count_rides(&self, filter: &RideFilter) -> Result<i64, Error> {
        let mut query = QueryBuilder::<Database>::new("SELECT COUNT(*) AS count FROM rides WHERE TRUE");
        push_conditions(&mut query, filter);

        let mut conn = self.pool.acquire().await?;
        let count: i64 = conn.fetch_one(query.build()).await?.try_get("count")?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, ride), fields(ride_id = %ride.id, status = %ride.status))]
    async fn update_ride(&self, ride: &Ride, guard: RideGuard) -> Result<bool, Error> {
        let mut conn = self.pool.acquire().await?;

        let result = conn
            .execute(
                sqlx::query("UPDATE rides SET driver_id = $2, status = $3, data = $4 WHERE id = $1 AND status = $5 AND driver_id IS NOT DISTINCT FROM $6 AND (data->>'rating')::INT4 IS NOT DISTINCT FROM $7")
                    .bind(&ride.id)
                    .bind(&ride.driver_id)
                    .bind(ride.status.name())
                    .bind(Json(ride))
                    .bind(guard.status.name())
                    .bind(&guard.driver_id)
                    .bind(guard.rating.map(i32::from)),
            )
            .await
            .map_err(|err| conflict_or_database_error(err, ACTIVE_RIDE_CONFLICT))?;

        Ok(result.rows_affected() == 1)
    }
}
