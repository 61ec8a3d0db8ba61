//! PostgreSQL store over the `personas` table

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use super::{PendingSource, RecordSink};
use crate::app::endpoint::LookupVariant;
use crate::app::models::{Field, FieldRecord};
use crate::constants::{db, env};
use crate::errors::{ConfigError, StoreError, StoreResult};

/// Connection settings, read from the environment
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Read `DATABASE_URL` (required) and `DATABASE_MAX_CONNECTIONS` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var(env::DATABASE_URL).map_err(|_| ConfigError::MissingField {
            field: env::DATABASE_URL.to_string(),
        })?;

        let max_connections = match std::env::var(env::DATABASE_MAX_CONNECTIONS) {
            Err(_) => db::DEFAULT_MAX_CONNECTIONS,
            Ok(raw) => match raw.parse::<u32>() {
                Ok(parsed) if parsed > 0 => parsed,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: env::DATABASE_MAX_CONNECTIONS.to_string(),
                        value: raw,
                        reason: "must be a positive integer".to_string(),
                    })
                }
            },
        };

        Ok(Self {
            url,
            max_connections,
        })
    }
}

/// Condition selecting rows that still lack any persisted field
fn pending_condition(variant: LookupVariant) -> String {
    variant
        .persisted_fields()
        .iter()
        .map(|field| match field {
            Field::BirthDate | Field::VerificationDigit => format!("{} IS NULL", field.column()),
            _ => format!("({0} IS NULL OR {0} = '')", field.column()),
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Build the UPDATE for the filled, persisted fields of a record
fn build_update(
    variant: LookupVariant,
    record: &FieldRecord,
) -> StoreResult<Option<QueryBuilder<'static, Postgres>>> {
    let fields: Vec<Field> = variant
        .persisted_fields()
        .iter()
        .copied()
        .filter(|field| record.is_filled(*field))
        .collect();
    if fields.is_empty() {
        return Ok(None);
    }

    let mut builder = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", db::TABLE));
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            builder.push(", ");
        }
        builder.push(format!("{} = ", field.column()));
        match field {
            Field::BirthDate => {
                let date = record.birth_date().ok_or_else(|| StoreError::InvalidValue {
                    column: field.column().to_string(),
                    value: record.get(*field).to_string(),
                })?;
                builder.push_bind(date);
            }
            _ => {
                builder.push_bind(record.get(*field).to_string());
            }
        }
    }
    builder.push(format!(" WHERE {} = ", db::IDENTIFIER_COLUMN));
    builder.push_bind(record.identifier.as_str().to_string());
    Ok(Some(builder))
}

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    variant: LookupVariant,
}

impl PgStore {
    /// Connect and verify the connection
    pub async fn connect(config: &DatabaseConfig, variant: LookupVariant) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(StoreError::Connection)?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(StoreError::Connection)?;

        info!("Connected to database ({} connections)", config.max_connections);
        Ok(Self { pool, variant })
    }
}

impl PendingSource for PgStore {
    async fn pending(&self, variant: LookupVariant) -> StoreResult<Vec<String>> {
        let sql = format!(
            "SELECT {id} FROM {table} WHERE {cond} ORDER BY id",
            id = db::IDENTIFIER_COLUMN,
            table = db::TABLE,
            cond = pending_condition(variant)
        );
        debug!("Pending query: {}", sql);

        let identifiers: Vec<String> = sqlx::query_scalar(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(identifiers)
    }
}

impl RecordSink for PgStore {
    async fn update(&self, record: &FieldRecord) -> StoreResult<()> {
        let Some(mut builder) = build_update(self.variant, record)? else {
            debug!("Nothing to persist for {}", record.identifier);
            return Ok(());
        };

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Write {
                identifier: record.identifier.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
