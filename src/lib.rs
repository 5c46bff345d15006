#[macro_use]
extern crate rocket;

pub mod admin_auth;
pub mod cache;
pub mod carriers;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod models;
pub mod refresh;
pub mod request_logger;
pub mod routes;
pub mod security_headers;
pub mod store;
pub mod workers;

use std::sync::Arc;
use std::time::Duration;

use email::enhancer::DescriptionEnhancer;
use email::ingestor::EmailIngestor;
use email::mail_source::MockMailSource;
use request_logger::RequestLogger;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{make_rapidoc, GeneralConfig, HideShowConfig, RapiDocConfig},
    settings::UrlObject,
    swagger_ui::{make_swagger_ui, SwaggerUIConfig},
};
use security_headers::SecurityHeaders;

use crate::cache::RefreshCache;
use crate::carriers::CarrierRegistry;
use crate::config::TrackerConfig;
use crate::db::TrackerDb;
use crate::models::VALID_CARRIER_CODES;
use crate::refresh::auto::AutoRefreshSupervisor;
use crate::routes::admin::TrackingUpdaterHandles;

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let config = TrackerConfig::from_env().expect("invalid configuration");

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Put, Method::Delete, Method::Patch]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(SecurityHeaders)
        .attach(TrackerDb::init())
        .attach(cors)
        .manage(config.clone())
        .attach(AdHoc::try_on_ignite("Run Migrations", |rocket| async move {
            match TrackerDb::fetch(&rocket) {
                Some(db) => {
                    let pool = (**db).clone();
                    match store::run_migrations(&pool).await {
                        Ok(_) => {
                            log::info!("database migrations successful");
                            Ok(rocket)
                        }
                        Err(e) => {
                            log::error!("database migrations failed: {e}");
                            Err(rocket)
                        }
                    }
                }
                None => {
                    log::error!("database pool not available for migrations");
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::try_on_ignite(
            "Manage Tracker State and Spawn Workers",
            |rocket| async move {
                let pool = match TrackerDb::fetch(&rocket) {
                    Some(db) => (**db).clone(),
                    None => {
                        log::error!("database pool not available");
                        return Err(rocket);
                    }
                };

                let config = match rocket.state::<TrackerConfig>() {
                    Some(config) => config.clone(),
                    None => {
                        log::error!("tracker config not available");
                        return Err(rocket);
                    }
                };

                let cache = Arc::new(RefreshCache::new(
                    pool.clone(),
                    config.cache_ttl,
                    !config.disable_cache,
                ));
                match cache.warm_from_store().await {
                    Ok(n) => log::info!("warmed {n} cache entries from the durable store"),
                    Err(e) => log::warn!("failed to warm refresh cache: {e}"),
                }

                let registry = Arc::new(CarrierRegistry::from_config(&config, reqwest::Client::new()));
                let enhancer = Arc::new(DescriptionEnhancer::new(pool.clone(), None));

                let mut worker_handles = Vec::new();

                for carrier in VALID_CARRIER_CODES {
                    let supervisor = AutoRefreshSupervisor::new(
                        carrier.to_string(),
                        pool.clone(),
                        cache.clone(),
                        registry.clone(),
                        config.auto_update_interval,
                        config.auto_update_fail_threshold,
                    );
                    worker_handles.push((carrier.to_string(), supervisor.handle()));
                    tokio::spawn(supervisor.run());
                }

                // The real mail provider wire protocol is out of scope; a
                // concrete `MailSource` adapter plugs in here when available.
                let ingestor = EmailIngestor::new(
                    pool.clone(),
                    Arc::new(MockMailSource::default()),
                    None,
                    config.email_check_interval,
                    config.email_max_per_run,
                    config.email_rate_limit_delay,
                );
                worker_handles.push(("email_ingestor".to_string(), ingestor.handle()));
                tokio::spawn(ingestor.run());

                let cache_for_ticker = cache.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(Duration::from_secs(300));
                    loop {
                        ticker.tick().await;
                        if let Err(e) = cache_for_ticker.evict_expired().await {
                            log::warn!("cache eviction pass failed: {e}");
                        }
                    }
                });

                Ok(rocket
                    .manage(pool)
                    .manage(cache)
                    .manage(registry)
                    .manage(enhancer)
                    .manage(TrackingUpdaterHandles(worker_handles)))
            },
        ))
        .mount(
            "/api",
            openapi_get_routes![
                routes::health::health,
                routes::shipments::list_shipments,
                routes::shipments::create_shipment,
                routes::shipments::get_shipment,
                routes::shipments::update_shipment,
                routes::shipments::delete_shipment,
                routes::shipments::get_shipment_events,
                routes::shipments::get_shipment_emails,
                routes::shipments::refresh,
                routes::emails::get_thread,
                routes::emails::get_body,
                routes::emails::link,
                routes::emails::unlink,
                routes::carriers::list_carriers,
                routes::admin::status,
                routes::admin::pause,
                routes::admin::resume,
                routes::admin::enhance_descriptions,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Package Tracker API", "../openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

static LOGGER: std::sync::Once = std::sync::Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Test-only scaffolding: an ephemeral Postgres database per test (via
/// `testcontainers`) and a minimal Rocket builder for mounting a handful of
/// routes without the full worker-spawning `rocket()` fairing chain.
#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};

    pub use database::{TestDatabase, TestDatabaseError};

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("TEST_DATABASE_URL not set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database factory for integration tests. Launches a disposable
        /// Postgres container, creates a throwaway database inside it, runs the
        /// crate's migrations, and tears everything down on `close`/`drop`.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            database_url: String,
            container: Option<ContainerAsync<GenericImage>>,
        }

        impl TestDatabase {
            /// Provisions a fresh database, skipping (via `MissingUrl`) when the
            /// environment opts out of container-backed integration tests.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if std::env::var("SKIP_CONTAINER_TESTS").is_ok() {
                    return Err(TestDatabaseError::MissingUrl);
                }
                Self::new().await
            }

            pub async fn new() -> Result<Self, TestDatabaseError> {
                let image = GenericImage::new("postgres", "16-alpine").with_wait_for(
                    WaitFor::message_on_stdout("database system is ready to accept connections"),
                );

                let request = image
                    .with_env_var("POSTGRES_DB", "postgres")
                    .with_env_var("POSTGRES_USER", "postgres")
                    .with_env_var("POSTGRES_PASSWORD", "postgres");

                let container = request.start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let base_options: PgConnectOptions =
                    admin_url.parse().map_err(TestDatabaseError::Sqlx)?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql)
                    .execute(&admin_pool)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                MIGRATOR.run(&pool).await?;

                let database_url =
                    format!("postgres://postgres:postgres@{}:{}/{}", host, port, new_db_name);

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    database_url,
                    container: Some(container),
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Connection string for this ephemeral database, usable as a
            /// `databases.tracker_db.url` figment override.
            pub fn database_url(&self) -> &str {
                &self.database_url
            }

            pub async fn reset(&self) -> Result<(), TestDatabaseError> {
                MIGRATOR.run(self.pool()).await?;
                Ok(())
            }

            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ =
                                drop_database_with_fallback(admin_options.clone(), &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database_with_fallback(
                                        admin_options.clone(),
                                        &db_name,
                                    )
                                    .await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing minimal Rocket instances in tests: random
    /// port, logging off, routes mounted under `/api`, state managed directly.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        attach_tracker_db: bool,
    }

    impl TestRocketBuilder {
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pg_pool: None,
                attach_tracker_db: false,
            }
        }

        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api".to_string(), routes));
            self
        }

        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Points Rocket's own `TrackerDb` pool (used by handlers taking a
        /// `Connection<TrackerDb>` guard, e.g. the health check) at the given
        /// database URL.
        pub fn attach_tracker_db(mut self, database_url: &str) -> Self {
            self.figment = self.figment.merge(("databases.tracker_db.url", database_url));
            self.attach_tracker_db = true;
            self
        }

        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);
            if self.attach_tracker_db {
                rocket = rocket.attach(TrackerDb::init());
            }

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            rocket
        }

        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }

    use crate::db::TrackerDb;
    use rocket_db_pools::Database;
}
