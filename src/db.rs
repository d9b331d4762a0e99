use crate::error::{IngestError, Result};
use crate::sink::{RecordSink, SinkError, SinkResult};
use crate::types::ZoneRecord;
use async_trait::async_trait;
use libsql::{Builder, Connection, Database};
use std::env;
use tracing::info;

const INSERT_ZONE_SQL: &str = "INSERT INTO zones (region, type, subtype, description, address, latitude, longitude, size, date, user, image) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

fn is_unique_violation(message: &str) -> bool {
    message.contains("UNIQUE constraint failed")
}

fn zone_params(record: &ZoneRecord) -> impl libsql::params::IntoParams {
    libsql::params![
        record.region.clone(),
        record.zone_type.clone(),
        record.subtype.clone(),
        record.description.clone(),
        record.address.clone(),
        record.latitude,
        record.longitude,
        record.size.clone(),
        record.date.map(|d| d.format("%Y-%m-%d").to_string()),
        record.creator.clone(),
        record.image.clone(),
    ]
}

/// libSQL-backed record sink. The `zones` table carries a UNIQUE
/// constraint on address; violations surface as `SinkError::Duplicate`.
pub struct ZoneDb {
    db: Database,
}

impl ZoneDb {
    /// Create a new zone database handle connected to Turso
    pub async fn new() -> Result<Self> {
        let url = env::var("LIBSQL_URL").map_err(|_| IngestError::Database {
            message: "LIBSQL_URL environment variable not set".to_string(),
        })?;

        let auth_token = env::var("LIBSQL_AUTH_TOKEN").map_err(|_| IngestError::Database {
            message: "LIBSQL_AUTH_TOKEN environment variable not set".to_string(),
        })?;

        info!("Connecting to Turso database at {}", url);

        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| IngestError::Database {
                message: format!("Failed to connect to database: {e}"),
            })?;

        Ok(Self { db })
    }

    /// Get a connection to the database
    pub async fn get_connection(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| IngestError::Database {
            message: format!("Failed to get database connection: {e}"),
        })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection().await?;

        // Read and execute the migration SQL
        let migration_sql = include_str!("../migrations/001_create_zones.sql");

        conn.execute_batch(migration_sql)
            .await
            .map_err(|e| IngestError::Database {
                message: format!("Failed to run migrations: {e}"),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl RecordSink for ZoneDb {
    async fn bulk_insert(&self, records: &[ZoneRecord]) -> SinkResult<()> {
        let conn = self.get_connection().await?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| IngestError::Database {
                message: format!("Failed to open transaction: {e}"),
            })?;

        for record in records {
            if let Err(e) = tx.execute(INSERT_ZONE_SQL, zone_params(record)).await {
                let message = e.to_string();
                let _ = tx.rollback().await;
                return if is_unique_violation(&message) {
                    Err(SinkError::Duplicate(record.address.clone()))
                } else {
                    Err(SinkError::Other(IngestError::Database {
                        message: format!("Bulk insert failed: {message}"),
                    }))
                };
            }
        }

        tx.commit().await.map_err(|e| IngestError::Database {
            message: format!("Failed to commit batch: {e}"),
        })?;
        Ok(())
    }

    async fn insert_one(&self, record: &ZoneRecord) -> SinkResult<()> {
        let conn = self.get_connection().await?;

        match conn.execute(INSERT_ZONE_SQL, zone_params(record)).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                if is_unique_violation(&message) {
                    Err(SinkError::Duplicate(record.address.clone()))
                } else {
                    Err(SinkError::Other(IngestError::Database {
                        message: format!("Insert failed: {message}"),
                    }))
                }
            }
        }
    }
}
