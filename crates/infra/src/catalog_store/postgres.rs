//! Postgres-backed module catalog.
//!
//! Records live in `engine_modules`, keyed by `(tenant_id, key)`. Updates are a
//! single conditional `UPDATE ... WHERE revision = $n`, so a stale writer affects
//! zero rows and is reported as a concurrency failure.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | CatalogStoreError |
//! |------------|----------------------|-------------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / Io / Other | N/A | `Backend` |

use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;

use opsconsole_core::{ExpectedVersion, TenantId};
use opsconsole_engines::{Category, Module, ModuleDefinition, ModuleKey, ModulePatch};

use super::r#trait::{CatalogStore, CatalogStoreError};

/// DDL for the catalog table. Applied by [`PostgresCatalogStore::ensure_schema`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS engine_modules (
    tenant_id       UUID        NOT NULL,
    key             TEXT        NOT NULL CHECK (key ~ '^[a-z0-9_-]+$'),
    title           TEXT        NOT NULL,
    description     TEXT        NOT NULL DEFAULT '',
    icon            TEXT        NOT NULL DEFAULT '',
    category        TEXT        NOT NULL,
    is_core         BOOLEAN     NOT NULL DEFAULT FALSE,
    is_installed    BOOLEAN     NOT NULL DEFAULT FALSE,
    is_enabled      BOOLEAN     NOT NULL DEFAULT FALSE,
    depends_on      JSONB       NOT NULL DEFAULT '[]'::jsonb,
    workspace_route TEXT,
    settings_route  TEXT,
    sort_order      INTEGER     NOT NULL DEFAULT 0,
    version         TEXT        NOT NULL DEFAULT '1.0.0',
    revision        BIGINT      NOT NULL DEFAULT 0,
    updated_at      TIMESTAMPTZ,
    PRIMARY KEY (tenant_id, key),
    CHECK (NOT is_enabled OR is_installed),
    CHECK (NOT is_core OR (is_installed AND is_enabled))
)
"#;

const COLUMNS: &str = "key, title, description, icon, category, is_core, is_installed, \
     is_enabled, depends_on, workspace_route, settings_route, sort_order, version, \
     revision, updated_at";

/// Byte-order title comparison, matching `sort_for_presentation`.
const PRESENTATION_ORDER: &str = r#"sort_order ASC, title COLLATE "C" ASC"#;

/// Postgres-backed catalog store.
///
/// ## Tenant Isolation
///
/// Every statement filters on `tenant_id`, which is also the leading primary key
/// column.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `engine_modules` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), CatalogStoreError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogStore for PostgresCatalogStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn fetch_all(&self, tenant_id: TenantId) -> Result<Vec<Module>, CatalogStoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM engine_modules WHERE tenant_id = $1 \
             ORDER BY {PRESENTATION_ORDER}"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_all", e))?;

        rows.iter().map(row_to_module).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, module = %key), err)]
    async fn fetch_one(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<Option<Module>, CatalogStoreError> {
        let sql = format!("SELECT {COLUMNS} FROM engine_modules WHERE tenant_id = $1 AND key = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(key.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_one", e))?;

        row.as_ref().map(row_to_module).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, module = %key), err)]
    async fn update(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
        patch: ModulePatch,
        expected: ExpectedVersion,
    ) -> Result<Module, CatalogStoreError> {
        let expected_revision = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(revision_to_db(v)?),
        };

        let sql = format!(
            r#"
            UPDATE engine_modules
            SET is_installed = COALESCE($3, is_installed),
                is_enabled = COALESCE($4, is_enabled),
                revision = revision + 1,
                updated_at = now()
            WHERE tenant_id = $1
                AND key = $2
                AND ($5::bigint IS NULL OR revision = $5)
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(key.as_str())
            .bind(patch.is_installed)
            .bind(patch.is_enabled)
            .bind(expected_revision)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update", e))?;

        match row {
            Some(row) => row_to_module(&row),
            // Zero rows: either the record is gone or the revision moved.
            None => match self.fetch_one(tenant_id, key).await? {
                None => Err(CatalogStoreError::NotFound(key.clone())),
                Some(current) => Err(CatalogStoreError::Concurrency(format!(
                    "{key}: expected {expected:?}, found {}",
                    current.revision
                ))),
            },
        }
    }

    #[instrument(
        skip(self, definitions),
        fields(tenant_id = %tenant_id, count = definitions.len()),
        err
    )]
    async fn provision(
        &self,
        tenant_id: TenantId,
        definitions: Vec<ModuleDefinition>,
    ) -> Result<Vec<Module>, CatalogStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("provision_begin", e))?;

        for def in definitions {
            let module = Module::provisioned(def);
            let depends_on: Vec<String> = module.depends_on.iter().map(|k| k.to_string()).collect();

            sqlx::query(
                r#"
                INSERT INTO engine_modules (
                    tenant_id, key, title, description, icon, category, is_core,
                    is_installed, is_enabled, depends_on, workspace_route,
                    settings_route, sort_order, version, revision, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0, now())
                ON CONFLICT (tenant_id, key) DO NOTHING
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(module.key.as_str())
            .bind(&module.title)
            .bind(&module.description)
            .bind(&module.icon)
            .bind(module.category.as_str())
            .bind(module.is_core)
            .bind(module.is_installed)
            .bind(module.is_enabled)
            .bind(Json(depends_on))
            .bind(&module.workspace_route)
            .bind(&module.settings_route)
            .bind(module.sort_order)
            .bind(&module.version)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("provision_insert", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("provision_commit", e))?;

        self.fetch_all(tenant_id).await
    }
}

fn row_to_module(row: &PgRow) -> Result<Module, CatalogStoreError> {
    let decode = |e: sqlx::Error| CatalogStoreError::Backend(format!("failed to decode row: {e}"));

    let key: String = row.try_get("key").map_err(decode)?;
    let category: String = row.try_get("category").map_err(decode)?;
    let depends_on: Json<Vec<String>> = row.try_get("depends_on").map_err(decode)?;
    let revision: i64 = row.try_get("revision").map_err(decode)?;

    let invalid = |e: opsconsole_core::DomainError| {
        CatalogStoreError::Backend(format!("invalid stored module {key:?}: {e}"))
    };

    Ok(Module {
        key: ModuleKey::parse(&key).map_err(invalid)?,
        title: row.try_get("title").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        icon: row.try_get("icon").map_err(decode)?,
        category: Category::from_str(&category).map_err(invalid)?,
        is_core: row.try_get("is_core").map_err(decode)?,
        is_installed: row.try_get("is_installed").map_err(decode)?,
        is_enabled: row.try_get("is_enabled").map_err(decode)?,
        depends_on: depends_on
            .0
            .iter()
            .map(|k| ModuleKey::parse(k))
            .collect::<Result<_, _>>()
            .map_err(invalid)?,
        workspace_route: row.try_get("workspace_route").map_err(decode)?,
        settings_route: row.try_get("settings_route").map_err(decode)?,
        sort_order: row.try_get("sort_order").map_err(decode)?,
        version: row.try_get("version").map_err(decode)?,
        revision: u64::try_from(revision)
            .map_err(|_| CatalogStoreError::Backend(format!("negative revision for {key:?}")))?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn revision_to_db(revision: u64) -> Result<i64, CatalogStoreError> {
    i64::try_from(revision)
        .map_err(|_| CatalogStoreError::Backend(format!("revision {revision} out of range")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogStoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            CatalogStoreError::Concurrency(format!("{operation}: {db}"))
        }
        _ => CatalogStoreError::Backend(format!("{operation}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_guards_the_flag_invariants() {
        assert!(SCHEMA.contains("PRIMARY KEY (tenant_id, key)"));
        assert!(SCHEMA.contains("CHECK (NOT is_enabled OR is_installed)"));
        assert!(SCHEMA.contains("CHECK (NOT is_core OR (is_installed AND is_enabled))"));
    }

    #[test]
    fn listing_orders_titles_by_byte_value() {
        assert_eq!(PRESENTATION_ORDER, r#"sort_order ASC, title COLLATE "C" ASC"#);
    }

    #[test]
    fn revisions_beyond_i64_are_rejected() {
        assert_eq!(revision_to_db(7).unwrap(), 7);
        assert!(matches!(revision_to_db(u64::MAX), Err(CatalogStoreError::Backend(_))));
    }

    #[test]
    fn non_database_errors_map_to_backend() {
        let err = map_sqlx_error("fetch_all", sqlx::Error::PoolClosed);
        assert!(matches!(err, CatalogStoreError::Backend(msg) if msg.starts_with("fetch_all")));
    }
}
