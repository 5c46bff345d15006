//! Static carrier registry table (base spec §3 `Carrier`).

use sqlx::PgPool;

use crate::models::Carrier;
use crate::store::StoreError;

pub async fn get_all(pool: &PgPool, active_only: bool) -> Result<Vec<Carrier>, StoreError> {
    let rows = if active_only {
        sqlx::query_as::<_, Carrier>("SELECT * FROM carriers WHERE active = true ORDER BY name")
            .fetch_all(pool)
            .await
    } else {
        sqlx::query_as::<_, Carrier>("SELECT * FROM carriers ORDER BY name")
            .fetch_all(pool)
            .await
    }
    .map_err(StoreError::Db)?;

    Ok(rows)
}
