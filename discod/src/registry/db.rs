use std::path::Path;
use anyhow::{Context, Result};
use rusqlite::{Connection, params, OptionalExtension};
use shared::types::{EndpointSet, ServiceRecord};
use chrono::Utc;

const SELECT_COLUMNS: &str = "SELECT service, environment, endpoints, updated_at FROM services";

pub struct RegistryDb {
    conn: Connection,
}

impl RegistryDb {
    /// Open or create the SQLite database with WAL mode enabled
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS services (
                service     TEXT NOT NULL,
                environment TEXT NOT NULL,
                endpoints   TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (service, environment)
            );

            CREATE INDEX IF NOT EXISTS idx_environment ON services(environment);
            "#,
        )
        .context("Failed to create database schema")?;

        Ok(Self { conn })
    }

    /// Replace the endpoint set for a (service, environment) pair.
    /// Returns true if the stored set changed.
    pub fn replace_endpoints(
        &self,
        service: &str,
        environment: &str,
        endpoints: &EndpointSet,
    ) -> Result<bool> {
        if let Some(existing) = self.get_service(service, environment)? {
            if &existing.endpoints == endpoints {
                return Ok(false);
            }
        }

        let endpoints_json = serde_json::to_string(endpoints)
            .context("Failed to serialize endpoints")?;

        self.conn.execute(
            r#"
            INSERT INTO services (service, environment, endpoints, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(service, environment) DO UPDATE SET
                endpoints = excluded.endpoints,
                updated_at = excluded.updated_at
            "#,
            params![service, environment, &endpoints_json, Utc::now().to_rfc3339()],
        )
        .context("Failed to replace endpoints")?;

        Ok(true)
    }

    /// Get every service in every environment
    pub fn get_all_services(&self) -> Result<Vec<ServiceRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY environment, service", SELECT_COLUMNS))
            .context("Failed to prepare query")?;

        let services = stmt
            .query_map([], Self::row_to_record)
            .context("Failed to query services")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect services")?;

        Ok(services)
    }

    /// Get services published under one environment
    pub fn get_services_by_environment(&self, environment: &str) -> Result<Vec<ServiceRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE environment = ?1 ORDER BY service", SELECT_COLUMNS))
            .context("Failed to prepare query")?;

        let services = stmt
            .query_map([environment], Self::row_to_record)
            .context("Failed to query services by environment")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect services")?;

        Ok(services)
    }

    pub fn get_service(&self, service: &str, environment: &str) -> Result<Option<ServiceRecord>> {
        let result = self
            .conn
            .query_row(
                &format!("{} WHERE service = ?1 AND environment = ?2", SELECT_COLUMNS),
                params![service, environment],
                Self::row_to_record,
            )
            .optional()
            .context("Failed to query service")?;

        Ok(result)
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<ServiceRecord, rusqlite::Error> {
        let endpoints_json: String = row.get(2)?;
        let updated_at_str: String = row.get(3)?;

        let endpoints = serde_json::from_str(&endpoints_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))?;

        let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))?
            .with_timezone(&Utc);

        Ok(ServiceRecord {
            service: row.get(0)?,
            environment: row.get(1)?,
            endpoints,
            updated_at,
        })
    }
}
