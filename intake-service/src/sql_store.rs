use crate::config::StorageConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{
    Case, CasePage, CaseStatus, CaseStore, CaseUpdate, FieldUpdate, ListQuery, NewCase, SortField,
    StoreError, StoreResult,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;

const CASE_ID_CONSTRAINT: &str = "form_entries_case_id_key";

const COLUMNS: &str = "id, case_id, full_name, email, phone_number, date_of_birth, job_title, \
     date_of_diagnosis, type_of_diagnosis, message, ip_address, user_agent, status, priority, \
     notes, submitted_at, contacted_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct CaseRow {
    id: i64,
    case_id: String,
    full_name: String,
    email: String,
    phone_number: Option<String>,
    date_of_birth: Option<NaiveDate>,
    job_title: Option<String>,
    date_of_diagnosis: Option<NaiveDate>,
    type_of_diagnosis: Option<String>,
    message: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    status: String,
    priority: String,
    notes: Option<String>,
    submitted_at: DateTime<Utc>,
    contacted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CaseRow> for Case {
    type Error = StoreError;

    fn try_from(row: CaseRow) -> StoreResult<Self> {
        let invalid = |e: common::UnknownVariant| StoreError::ConstraintViolation(e.to_string());
        let type_of_diagnosis = row
            .type_of_diagnosis
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(invalid)?;
        Ok(Case {
            id: row.id,
            case_id: row.case_id,
            full_name: row.full_name,
            email: row.email,
            phone_number: row.phone_number,
            date_of_birth: row.date_of_birth,
            job_title: row.job_title,
            date_of_diagnosis: row.date_of_diagnosis,
            type_of_diagnosis,
            message: row.message,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            status: row.status.parse().map_err(invalid)?,
            priority: row.priority.parse().map_err(invalid)?,
            notes: row.notes,
            submitted_at: row.submitted_at,
            contacted_at: row.contacted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Translate driver errors into the store taxonomy
fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) => {
            // SQLSTATE class 22 is data exceptions, 23 integrity violations
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            if code.starts_with("22") || code.starts_with("23") {
                StoreError::ConstraintViolation(db.message().to_string())
            } else {
                StoreError::Connectivity(db.message().to_string())
            }
        }
        other => StoreError::Connectivity(other.to_string()),
    }
}

fn to_case(row: CaseRow) -> StoreResult<Case> {
    Case::try_from(row)
}

/// Escape LIKE metacharacters so search text matches literally
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_search(builder: &mut QueryBuilder<'_, Postgres>, search: Option<&str>) {
    let Some(search) = search else {
        return;
    };
    let pattern = like_pattern(search);
    builder.push(" WHERE (");
    for (i, column) in ["full_name", "email", "case_id", "job_title"].iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push(*column).push(" ILIKE ").push_bind(pattern.clone());
    }
    builder.push(")");
}

fn order_expression(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at",
        SortField::FullName => "LOWER(full_name)",
        SortField::Email => "LOWER(email)",
    }
}

/// PostgreSQL-backed case store
#[derive(Clone)]
pub struct PgCaseStore {
    pool: Arc<PgPool>,
}

impl PgCaseStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .context("storage.database_url is not set")?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }
}

#[async_trait]
impl CaseStore for PgCaseStore {
    async fn create(&self, new_case: NewCase) -> StoreResult<Case> {
        let NewCase {
            submission: s,
            case_id,
            submitted_at,
            ip_address,
            user_agent,
        } = new_case;
        let sql = format!(
            "INSERT INTO form_entries (case_id, full_name, email, phone_number, date_of_birth, \
             job_title, date_of_diagnosis, type_of_diagnosis, message, ip_address, user_agent, \
             submitted_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );

        let result = sqlx::query_as::<_, CaseRow>(&sql)
            .bind(&case_id)
            .bind(&s.full_name)
            .bind(&s.email)
            .bind(&s.phone_number)
            .bind(s.date_of_birth)
            .bind(&s.job_title)
            .bind(s.date_of_diagnosis)
            .bind(s.type_of_diagnosis.map(|d| d.as_str()))
            .bind(&s.message)
            .bind(&ip_address)
            .bind(&user_agent)
            .bind(submitted_at)
            .fetch_one(&*self.pool)
            .await;

        match result {
            Ok(row) => to_case(row),
            Err(sqlx::Error::Database(db))
                if db.is_unique_violation() && db.constraint() == Some(CASE_ID_CONSTRAINT) =>
            {
                Err(StoreError::DuplicateIdentifier { case_id })
            }
            Err(err) => Err(store_error(err)),
        }
    }

    async fn update_status(&self, id: i64, update: CaseUpdate) -> StoreResult<Case> {
        let (touch_notes, notes) = match update.notes {
            FieldUpdate::Keep => (false, None),
            FieldUpdate::Clear => (true, None),
            FieldUpdate::Set(text) => (true, Some(text)),
        };

        // contacted_at is set in this statement; a separate read would race
        let sql = format!(
            "UPDATE form_entries SET \
               status = COALESCE($2::text, status), \
               priority = COALESCE($3::text, priority), \
               notes = CASE WHEN $4 THEN $5 ELSE notes END, \
               contacted_at = CASE WHEN $2::text = 'contacted' AND contacted_at IS NULL \
                              THEN NOW() ELSE contacted_at END, \
               updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );

        let row = sqlx::query_as::<_, CaseRow>(&sql)
            .bind(id)
            .bind(update.status.map(|s| s.as_str()))
            .bind(update.priority.map(|p| p.as_str()))
            .bind(touch_notes)
            .bind(notes)
            .fetch_optional(&*self.pool)
            .await
            .map_err(store_error)?;

        row.map_or(Err(StoreError::NotFound), to_case)
    }

    async fn soft_delete(&self, id: i64) -> StoreResult<Case> {
        let sql = format!(
            "UPDATE form_entries SET status = 'closed', updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, CaseRow>(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(store_error)?;

        row.map_or(Err(StoreError::NotFound), to_case)
    }

    async fn get(&self, id: i64) -> StoreResult<Case> {
        let sql = format!("SELECT {COLUMNS} FROM form_entries WHERE id = $1");
        let row = sqlx::query_as::<_, CaseRow>(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(store_error)?;

        row.map_or(Err(StoreError::NotFound), to_case)
    }

    async fn get_by_case_id(&self, case_id: &str) -> StoreResult<Case> {
        let sql = format!("SELECT {COLUMNS} FROM form_entries WHERE case_id = $1");
        let row = sqlx::query_as::<_, CaseRow>(&sql)
            .bind(case_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(store_error)?;

        row.map_or(Err(StoreError::NotFound), to_case)
    }

    async fn list(&self, query: &ListQuery) -> StoreResult<CasePage> {
        let search = query.search.as_deref();

        let mut count: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM form_entries");
        push_search(&mut count, search);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await
            .map_err(store_error)?;

        let mut select: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM form_entries"));
        push_search(&mut select, search);
        let direction = query.sort_order.as_str();
        select
            .push(" ORDER BY ")
            .push(order_expression(query.sort_by))
            .push(" ")
            .push(direction)
            .push(", id ")
            .push(direction);
        select
            .push(" LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let rows: Vec<CaseRow> = select
            .build_query_as()
            .fetch_all(&*self.pool)
            .await
            .map_err(store_error)?;

        let entries = rows.into_iter().map(to_case).collect::<StoreResult<Vec<_>>>()?;
        Ok(CasePage {
            entries,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn count_all(&self) -> StoreResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM form_entries")
            .fetch_one(&*self.pool)
            .await
            .map_err(store_error)?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn count_submitted_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        let sql = "SELECT COUNT(*) FROM form_entries WHERE submitted_at >= $1";
        let total: i64 = sqlx::query_scalar(sql)
            .bind(since)
            .fetch_one(&*self.pool)
            .await
            .map_err(store_error)?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn count_by_status(&self) -> StoreResult<BTreeMap<CaseStatus, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM form_entries GROUP BY status")
                .fetch_all(&*self.pool)
                .await
                .map_err(store_error)?;

        rows.into_iter()
            .map(|(status, count)| {
                let status = status
                    .parse::<CaseStatus>()
                    .map_err(|e| StoreError::ConstraintViolation(e.to_string()))?;
                Ok((status, u64::try_from(count).unwrap_or(0)))
            })
            .collect()
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(sqlx::query("SELECT 1").execute(&*self.pool).await.is_ok())
    }
}
