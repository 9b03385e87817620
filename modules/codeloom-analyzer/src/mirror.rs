//! Optional relational mirror of analyzer output.
//!
//! When `MIRROR_DATABASE_URL` is set, every emitted node and relationship
//! stub is also upserted into Postgres side tables. The bulk scanner
//! truncates these tables when a full scan asks for `wipe_existing`.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use codeloom_common::AnalyzerResult;

pub struct Mirror {
    pool: PgPool,
}

impl Mirror {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        let mirror = Self { pool };
        mirror.ensure_tables().await?;
        info!("analyzer mirror connected");
        Ok(mirror)
    }

    async fn ensure_tables(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS code_nodes (
                gid TEXT PRIMARY KEY,
                canonical_id TEXT NOT NULL,
                name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                language TEXT NOT NULL,
                labels JSONB NOT NULL,
                properties JSONB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS code_relationships (
                source_gid TEXT NOT NULL,
                target_canonical_id TEXT NOT NULL,
                rel_type TEXT NOT NULL,
                properties JSONB NOT NULL,
                PRIMARY KEY (source_gid, target_canonical_id, rel_type)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mirror one result. Failures here must not fail the analysis job;
    /// the caller logs and continues.
    pub async fn record(&self, result: &AnalyzerResult) -> Result<(), sqlx::Error> {
        for node in &result.nodes_upserted {
            sqlx::query(
                "INSERT INTO code_nodes (gid, canonical_id, name, file_path, language, labels, properties)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (gid) DO UPDATE SET
                     canonical_id = EXCLUDED.canonical_id,
                     name = EXCLUDED.name,
                     file_path = EXCLUDED.file_path,
                     language = EXCLUDED.language,
                     labels = EXCLUDED.labels,
                     properties = EXCLUDED.properties",
            )
            .bind(&node.gid)
            .bind(&node.canonical_id)
            .bind(&node.name)
            .bind(&node.file_path)
            .bind(&node.language)
            .bind(serde_json::to_value(&node.labels).unwrap_or_default())
            .bind(serde_json::Value::Object(node.properties.clone()))
            .execute(&self.pool)
            .await?;
        }

        for rel in &result.relationships_upserted {
            sqlx::query(
                "INSERT INTO code_relationships (source_gid, target_canonical_id, rel_type, properties)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (source_gid, target_canonical_id, rel_type)
                 DO UPDATE SET properties = EXCLUDED.properties",
            )
            .bind(&rel.source_gid)
            .bind(&rel.target_canonical_id)
            .bind(&rel.rel_type)
            .bind(serde_json::Value::Object(rel.properties.clone()))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

/// Truncate the mirror tables. Used by the bulk scanner before a
/// wiping full scan.
pub async fn wipe_tables(database_url: &str) -> Result<(), sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await?;
    sqlx::query("TRUNCATE TABLE code_nodes, code_relationships")
        .execute(&pool)
        .await?;
    info!("mirror tables truncated");
    Ok(())
}
