use package_tracker::models::HealthStatus;
use package_tracker::routes::health::health;
use package_tracker::test_support::{TestDatabase, TestDatabaseError, TestRocketBuilder};
use rocket::http::Status;
use rocket::routes;

#[tokio::test]
async fn health_endpoint_reports_database_up() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping health route test: container tests disabled");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let client = TestRocketBuilder::new()
        .attach_tracker_db(test_db.database_url())
        .mount_api_routes(routes![health])
        .async_client()
        .await;

    let response = client.get("/api/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let payload: HealthStatus = response.into_json().await.expect("valid JSON payload");
    assert_eq!(payload.status, "healthy");
    assert_eq!(payload.database, "up");

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}
