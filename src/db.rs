use rocket_db_pools::{Database, sqlx};

/// Primary connection pool, managed by Rocket and shared with background workers.
#[derive(Database)]
#[database("tracker_db")]
pub struct TrackerDb(sqlx::PgPool);
