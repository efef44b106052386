use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use dukaan_catalog::{HomepageSection, SectionKind};
use dukaan_core::repository::{HomepageRepository, StoreResult, VisitRepository};
use dukaan_core::StoreError;
use dukaan_shared::models::events::VisitEvent;

use crate::database::{db_error, decode_enum};

const SECTION_COLUMNS: &str =
    "id, kind, title, subtitle, position, payload, is_active, starts_at, ends_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct SectionRow {
    id: Uuid,
    kind: String,
    title: String,
    subtitle: Option<String>,
    position: i32,
    payload: serde_json::Value,
    is_active: bool,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SectionRow> for HomepageSection {
    type Error = StoreError;

    fn try_from(row: SectionRow) -> Result<Self, Self::Error> {
        Ok(HomepageSection {
            id: row.id,
            kind: decode_enum(&row.kind, SectionKind::parse, "kind")?,
            title: row.title,
            subtitle: row.subtitle,
            position: row.position,
            payload: row.payload,
            is_active: row.is_active,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct StoreHomepageRepository {
    pool: PgPool,
}

impl StoreHomepageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HomepageRepository for StoreHomepageRepository {
    async fn list(&self) -> StoreResult<Vec<HomepageSection>> {
        let rows: Vec<SectionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM homepage_sections ORDER BY position ASC, created_at ASC",
            SECTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(HomepageSection::try_from).collect()
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<HomepageSection>> {
        let row: Option<SectionRow> =
            sqlx::query_as(&format!("SELECT {} FROM homepage_sections WHERE id = $1", SECTION_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(HomepageSection::try_from).transpose()
    }

    async fn create(&self, section: &HomepageSection) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO homepage_sections (id, kind, title, subtitle, position, payload, is_active,
                starts_at, ends_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(section.id)
        .bind(section.kind.as_str())
        .bind(&section.title)
        .bind(&section.subtitle)
        .bind(section.position)
        .bind(&section.payload)
        .bind(section.is_active)
        .bind(section.starts_at)
        .bind(section.ends_at)
        .bind(section.created_at)
        .bind(section.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update(&self, section: &HomepageSection) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE homepage_sections
            SET kind = $2, title = $3, subtitle = $4, position = $5, payload = $6, is_active = $7,
                starts_at = $8, ends_at = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(section.id)
        .bind(section.kind.as_str())
        .bind(&section.title)
        .bind(&section.subtitle)
        .bind(section.position)
        .bind(&section.payload)
        .bind(section.is_active)
        .bind(section.starts_at)
        .bind(section.ends_at)
        .bind(section.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("section {}", section.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM homepage_sections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("section {}", id)));
        }
        Ok(())
    }

    async fn reorder(&self, ids: &[Uuid]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for (position, id) in ids.iter().enumerate() {
            let result = sqlx::query(
                "UPDATE homepage_sections SET position = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
            if result.rows_affected() == 0 {
                // dropping tx rolls back the positions already written
                return Err(StoreError::NotFound(format!("section {}", id)));
            }
        }
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct VisitRow {
    id: Uuid,
    session_id: String,
    event_type: String,
    path: String,
    referrer: Option<String>,
    product_id: Option<Uuid>,
    bundle_id: Option<Uuid>,
    ip_hash: Option<String>,
    user_agent: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl From<VisitRow> for VisitEvent {
    fn from(row: VisitRow) -> Self {
        VisitEvent {
            id: row.id,
            session_id: row.session_id,
            event_type: row.event_type,
            path: row.path,
            referrer: row.referrer,
            product_id: row.product_id,
            bundle_id: row.bundle_id,
            ip_hash: row.ip_hash,
            user_agent: row.user_agent,
            occurred_at: row.occurred_at,
        }
    }
}

pub struct StoreVisitRepository {
    pool: PgPool,
}

impl StoreVisitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VisitRepository for StoreVisitRepository {
    async fn record(&self, visit: &VisitEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO visits (id, session_id, event_type, path, referrer, product_id, bundle_id,
                ip_hash, user_agent, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(visit.id)
        .bind(&visit.session_id)
        .bind(&visit.event_type)
        .bind(&visit.path)
        .bind(&visit.referrer)
        .bind(visit.product_id)
        .bind(visit.bundle_id)
        .bind(&visit.ip_hash)
        .bind(&visit.user_agent)
        .bind(visit.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn list_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<Vec<VisitEvent>> {
        let rows: Vec<VisitRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, event_type, path, referrer, product_id, bundle_id, ip_hash, user_agent, occurred_at
            FROM visits
            WHERE occurred_at >= $1 AND occurred_at < $2
            ORDER BY occurred_at ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(VisitEvent::from).collect())
    }
}
