//! Database service for provider-request-service.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Consent, CreateProviderRequest, EvidenceType, GreencheckAsn, GreencheckIp, HostingProvider,
    Location, NewEvidence, NewHostingProvider, NewIpRange, NewLocation, NewSupportingDocument,
    Owner, ProviderLocation, ProviderRequest, ProviderRequestStatus, RequestAsn, RequestEvidence,
    RequestIpRange, ServiceTag, SetConsent, SupportingDocument,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{
    DirectoryStore, IdentityStore, RequestStore, Store, StoreResult, TagVocabulary, UnitOfWork,
};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "provider-request-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl Store for Database {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> StoreResult<PgUnitOfWork> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;
        Ok(PgUnitOfWork { tx })
    }
}

/// One PostgreSQL transaction. Dropping it without commit rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn db_error(operation: &str, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            StoreError::UniqueViolation {
                constraint: db_err.constraint().unwrap_or("unknown").to_string(),
            }
        }
        _ => StoreError::Backend(anyhow::anyhow!("Failed to {}: {}", operation, e)),
    }
}

fn parse_ip(value: &str) -> StoreResult<IpAddr> {
    value
        .parse()
        .map_err(|e| StoreError::Backend(anyhow::anyhow!("Invalid IP address '{}': {}", value, e)))
}

fn parse_evidence_type(value: &str) -> StoreResult<EvidenceType> {
    EvidenceType::parse(value)
        .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("Unknown evidence type '{}'", value)))
}

// -------------------------------------------------------------------------
// Row types
// -------------------------------------------------------------------------

#[derive(FromRow)]
struct RequestRow {
    request_id: Uuid,
    name: String,
    website: String,
    description: String,
    status: String,
    created_by: Option<Uuid>,
    authorised_by_org: bool,
    created_utc: DateTime<Utc>,
    modified_utc: DateTime<Utc>,
}

impl TryFrom<RequestRow> for ProviderRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> StoreResult<Self> {
        let status = ProviderRequestStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("Unknown request status '{}'", row.status))
        })?;
        Ok(Self {
            request_id: row.request_id,
            name: row.name,
            website: row.website,
            description: row.description,
            status,
            created_by: row.created_by,
            authorised_by_org: row.authorised_by_org,
            created_utc: row.created_utc,
            modified_utc: row.modified_utc,
        })
    }
}

#[derive(FromRow)]
struct IpRangeRow {
    ip_range_id: Uuid,
    request_id: Uuid,
    ip_start: String,
    ip_end: String,
}

impl TryFrom<IpRangeRow> for RequestIpRange {
    type Error = StoreError;

    fn try_from(row: IpRangeRow) -> StoreResult<Self> {
        Ok(Self {
            ip_range_id: row.ip_range_id,
            request_id: row.request_id,
            start: parse_ip(&row.ip_start)?,
            end: parse_ip(&row.ip_end)?,
        })
    }
}

#[derive(FromRow)]
struct EvidenceRow {
    evidence_id: Uuid,
    request_id: Uuid,
    title: String,
    description: String,
    link: Option<String>,
    file: Option<String>,
    evidence_type: String,
    public: bool,
}

impl TryFrom<EvidenceRow> for RequestEvidence {
    type Error = StoreError;

    fn try_from(row: EvidenceRow) -> StoreResult<Self> {
        Ok(Self {
            evidence_type: parse_evidence_type(&row.evidence_type)?,
            evidence_id: row.evidence_id,
            request_id: row.request_id,
            title: row.title,
            description: row.description,
            link: row.link,
            file: row.file,
            public: row.public,
        })
    }
}

#[derive(FromRow)]
struct ProviderRow {
    provider_id: Uuid,
    request_id: Option<Uuid>,
    name: String,
    description: String,
    website: String,
    created_utc: DateTime<Utc>,
}

impl ProviderRow {
    fn with_locations(self, locations: Vec<ProviderLocation>) -> HostingProvider {
        HostingProvider {
            provider_id: self.provider_id,
            request_id: self.request_id,
            name: self.name,
            description: self.description,
            website: self.website,
            locations,
            created_utc: self.created_utc,
        }
    }
}

#[derive(FromRow)]
struct GreencheckIpRow {
    ip_id: Uuid,
    provider_id: Uuid,
    ip_start: String,
    ip_end: String,
    active: bool,
}

impl TryFrom<GreencheckIpRow> for GreencheckIp {
    type Error = StoreError;

    fn try_from(row: GreencheckIpRow) -> StoreResult<Self> {
        Ok(Self {
            ip_id: row.ip_id,
            provider_id: row.provider_id,
            ip_start: parse_ip(&row.ip_start)?,
            ip_end: parse_ip(&row.ip_end)?,
            active: row.active,
        })
    }
}

#[derive(FromRow)]
struct DocumentRow {
    document_id: Uuid,
    provider_id: Uuid,
    title: String,
    description: String,
    url: String,
    attachment: String,
    valid_from: NaiveDate,
    valid_to: NaiveDate,
    evidence_type: String,
    public: bool,
}

impl TryFrom<DocumentRow> for SupportingDocument {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> StoreResult<Self> {
        Ok(Self {
            evidence_type: parse_evidence_type(&row.evidence_type)?,
            document_id: row.document_id,
            provider_id: row.provider_id,
            title: row.title,
            description: row.description,
            url: row.url,
            attachment: row.attachment,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            public: row.public,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

impl PgUnitOfWork {
    async fn provider_locations(&mut self, provider_id: Uuid) -> StoreResult<Vec<ProviderLocation>> {
        sqlx::query_as::<_, ProviderLocation>(
            r#"
            SELECT city, country
            FROM hosting_provider_locations
            WHERE provider_id = $1
            ORDER BY position
            "#,
        )
        .bind(provider_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("fetch provider locations", e))
    }

    async fn hydrate_providers(&mut self, rows: Vec<ProviderRow>) -> StoreResult<Vec<HostingProvider>> {
        let mut providers = Vec::with_capacity(rows.len());
        for row in rows {
            let locations = self.provider_locations(row.provider_id).await?;
            providers.push(row.with_locations(locations));
        }
        Ok(providers)
    }

    async fn fetch_request(
        &mut self,
        request_id: Uuid,
        for_update: bool,
    ) -> StoreResult<Option<ProviderRequest>> {
        let sql = if for_update {
            r#"
            SELECT request_id, name, website, description, status, created_by, authorised_by_org, created_utc, modified_utc
            FROM provider_requests
            WHERE request_id = $1
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT request_id, name, website, description, status, created_by, authorised_by_org, created_utc, modified_utc
            FROM provider_requests
            WHERE request_id = $1
            "#
        };

        let row = sqlx::query_as::<_, RequestRow>(sql)
            .bind(request_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("get provider request", e))?;

        row.map(ProviderRequest::try_from).transpose()
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("commit transaction", e))
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| db_error("roll back transaction", e))
    }
}

// -------------------------------------------------------------------------
// Request Operations
// -------------------------------------------------------------------------

#[async_trait]
impl RequestStore for PgUnitOfWork {
    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn insert_request(&mut self, input: &CreateProviderRequest) -> StoreResult<ProviderRequest> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_request"])
            .start_timer();

        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            INSERT INTO provider_requests (request_id, name, website, description, status, created_by, authorised_by_org)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING request_id, name, website, description, status, created_by, authorised_by_org, created_utc, modified_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.website)
        .bind(&input.description)
        .bind(input.status.as_str())
        .bind(input.created_by)
        .bind(input.authorised_by_org)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create provider request", e))?;

        timer.observe_duration();

        ProviderRequest::try_from(row)
    }

    async fn get_request(&mut self, request_id: Uuid) -> StoreResult<Option<ProviderRequest>> {
        self.fetch_request(request_id, false).await
    }

    #[instrument(skip(self), fields(request_id = %request_id))]
    async fn lock_request(&mut self, request_id: Uuid) -> StoreResult<Option<ProviderRequest>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["lock_request"])
            .start_timer();
        let request = self.fetch_request(request_id, true).await?;
        timer.observe_duration();
        Ok(request)
    }

    #[instrument(skip(self), fields(request_id = %request_id, status = %status))]
    async fn update_request_status(
        &mut self,
        request_id: Uuid,
        status: ProviderRequestStatus,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE provider_requests
            SET status = $2, modified_utc = NOW()
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("update request status", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "Request {} does not exist",
                request_id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(request_id = %request_id))]
    async fn delete_request(&mut self, request_id: Uuid) -> StoreResult<bool> {
        // Child rows go with the request via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM provider_requests WHERE request_id = $1")
            .bind(request_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("delete provider request", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_location(&mut self, request_id: Uuid, input: &NewLocation) -> StoreResult<Location> {
        sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO provider_request_locations (location_id, request_id, name, city, country)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING location_id, request_id, name, city, country
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request_id)
        .bind(&input.name)
        .bind(&input.city)
        .bind(&input.country)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create location", e))
    }

    async fn list_locations(&mut self, request_id: Uuid) -> StoreResult<Vec<Location>> {
        sqlx::query_as::<_, Location>(
            r#"
            SELECT location_id, request_id, name, city, country
            FROM provider_request_locations
            WHERE request_id = $1
            ORDER BY position
            "#,
        )
        .bind(request_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list locations", e))
    }

    async fn insert_request_asn(&mut self, request_id: Uuid, asn: i64) -> StoreResult<RequestAsn> {
        sqlx::query_as::<_, RequestAsn>(
            r#"
            INSERT INTO provider_request_asns (asn_id, request_id, asn)
            VALUES ($1, $2, $3)
            RETURNING asn_id, request_id, asn
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request_id)
        .bind(asn)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create request ASN", e))
    }

    async fn list_request_asns(&mut self, request_id: Uuid) -> StoreResult<Vec<RequestAsn>> {
        sqlx::query_as::<_, RequestAsn>(
            r#"
            SELECT asn_id, request_id, asn
            FROM provider_request_asns
            WHERE request_id = $1
            ORDER BY position
            "#,
        )
        .bind(request_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list request ASNs", e))
    }

    async fn insert_request_ip_range(
        &mut self,
        request_id: Uuid,
        input: &NewIpRange,
    ) -> StoreResult<RequestIpRange> {
        let row = sqlx::query_as::<_, IpRangeRow>(
            r#"
            INSERT INTO provider_request_ip_ranges (ip_range_id, request_id, ip_start, ip_end)
            VALUES ($1, $2, $3, $4)
            RETURNING ip_range_id, request_id, ip_start, ip_end
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request_id)
        .bind(input.start.to_string())
        .bind(input.end.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create request IP range", e))?;

        RequestIpRange::try_from(row)
    }

    async fn list_request_ip_ranges(&mut self, request_id: Uuid) -> StoreResult<Vec<RequestIpRange>> {
        let rows = sqlx::query_as::<_, IpRangeRow>(
            r#"
            SELECT ip_range_id, request_id, ip_start, ip_end
            FROM provider_request_ip_ranges
            WHERE request_id = $1
            ORDER BY position
            "#,
        )
        .bind(request_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list request IP ranges", e))?;

        convert_all(rows)
    }

    async fn insert_evidence(
        &mut self,
        request_id: Uuid,
        input: &NewEvidence,
    ) -> StoreResult<RequestEvidence> {
        let row = sqlx::query_as::<_, EvidenceRow>(
            r#"
            INSERT INTO provider_request_evidence (evidence_id, request_id, title, description, link, file, evidence_type, public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING evidence_id, request_id, title, description, link, file, evidence_type, public
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.link)
        .bind(&input.file)
        .bind(input.evidence_type.as_str())
        .bind(input.public)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create evidence", e))?;

        RequestEvidence::try_from(row)
    }

    async fn list_evidence(&mut self, request_id: Uuid) -> StoreResult<Vec<RequestEvidence>> {
        let rows = sqlx::query_as::<_, EvidenceRow>(
            r#"
            SELECT evidence_id, request_id, title, description, link, file, evidence_type, public
            FROM provider_request_evidence
            WHERE request_id = $1
            ORDER BY position
            "#,
        )
        .bind(request_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list evidence", e))?;

        convert_all(rows)
    }

    async fn upsert_consent(&mut self, request_id: Uuid, input: &SetConsent) -> StoreResult<Consent> {
        sqlx::query_as::<_, Consent>(
            r#"
            INSERT INTO provider_request_consents (request_id, data_processing_opt_in, newsletter_opt_in)
            VALUES ($1, $2, $3)
            ON CONFLICT (request_id) DO UPDATE
                SET data_processing_opt_in = EXCLUDED.data_processing_opt_in,
                    newsletter_opt_in = EXCLUDED.newsletter_opt_in
            RETURNING request_id, data_processing_opt_in, newsletter_opt_in
            "#,
        )
        .bind(request_id)
        .bind(input.data_processing_opt_in)
        .bind(input.newsletter_opt_in)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("set consent", e))
    }

    async fn get_consent(&mut self, request_id: Uuid) -> StoreResult<Option<Consent>> {
        sqlx::query_as::<_, Consent>(
            r#"
            SELECT request_id, data_processing_opt_in, newsletter_opt_in
            FROM provider_request_consents
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("get consent", e))
    }

    #[instrument(skip(self, tag_ids), fields(request_id = %request_id, tag_count = tag_ids.len()))]
    async fn set_request_services(&mut self, request_id: Uuid, tag_ids: &[Uuid]) -> StoreResult<()> {
        sqlx::query("DELETE FROM provider_request_services WHERE request_id = $1")
            .bind(request_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("clear request services", e))?;

        sqlx::query(
            r#"
            INSERT INTO provider_request_services (request_id, tag_id)
            SELECT $1, tag_id FROM UNNEST($2::uuid[]) AS t(tag_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(request_id)
        .bind(tag_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("set request services", e))?;

        Ok(())
    }

    async fn list_request_services(&mut self, request_id: Uuid) -> StoreResult<Vec<ServiceTag>> {
        sqlx::query_as::<_, ServiceTag>(
            r#"
            SELECT t.tag_id, t.slug, t.name
            FROM service_tags t
            JOIN provider_request_services s ON s.tag_id = t.tag_id
            WHERE s.request_id = $1
            ORDER BY t.slug
            "#,
        )
        .bind(request_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list request services", e))
    }
}

// -------------------------------------------------------------------------
// Tag Vocabulary
// -------------------------------------------------------------------------

#[async_trait]
impl TagVocabulary for PgUnitOfWork {
    async fn find_tags_by_slugs(&mut self, slugs: &[String]) -> StoreResult<Vec<ServiceTag>> {
        sqlx::query_as::<_, ServiceTag>(
            r#"
            SELECT tag_id, slug, name
            FROM service_tags
            WHERE slug = ANY($1)
            ORDER BY slug
            "#,
        )
        .bind(slugs)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("find tags", e))
    }

    async fn list_tags(&mut self) -> StoreResult<Vec<ServiceTag>> {
        sqlx::query_as::<_, ServiceTag>("SELECT tag_id, slug, name FROM service_tags ORDER BY slug")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("list tags", e))
    }

    async fn upsert_tag(&mut self, slug: &str, name: &str) -> StoreResult<ServiceTag> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        sqlx::query_as::<_, ServiceTag>(
            r#"
            INSERT INTO service_tags (tag_id, slug, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING tag_id, slug, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(slug)
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create tag", e))
    }
}

// -------------------------------------------------------------------------
// Identity Operations
// -------------------------------------------------------------------------

#[async_trait]
impl IdentityStore for PgUnitOfWork {
    async fn insert_owner(&mut self, name: &str) -> StoreResult<Owner> {
        sqlx::query_as::<_, Owner>(
            r#"
            INSERT INTO owners (owner_id, name)
            VALUES ($1, $2)
            RETURNING owner_id, name, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create owner", e))
    }

    async fn get_owner(&mut self, owner_id: Uuid) -> StoreResult<Option<Owner>> {
        sqlx::query_as::<_, Owner>("SELECT owner_id, name, created_utc FROM owners WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("get owner", e))
    }

    async fn lock_owner(&mut self, owner_id: Uuid) -> StoreResult<Option<Owner>> {
        sqlx::query_as::<_, Owner>(
            "SELECT owner_id, name, created_utc FROM owners WHERE owner_id = $1 FOR UPDATE",
        )
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("lock owner", e))
    }

    async fn providers_for_owner(&mut self, owner_id: Uuid) -> StoreResult<Vec<HostingProvider>> {
        let rows = sqlx::query_as::<_, ProviderRow>(
            r#"
            SELECT hp.provider_id, hp.request_id, hp.name, hp.description, hp.website, hp.created_utc
            FROM hosting_providers hp
            JOIN owner_providers op ON op.provider_id = hp.provider_id
            WHERE op.owner_id = $1
            ORDER BY op.created_utc
            "#,
        )
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list owner providers", e))?;

        self.hydrate_providers(rows).await
    }

    #[instrument(skip(self), fields(owner_id = %owner_id, provider_id = %provider_id))]
    async fn bind_owner(&mut self, owner_id: Uuid, provider_id: Uuid) -> StoreResult<()> {
        sqlx::query("INSERT INTO owner_providers (owner_id, provider_id) VALUES ($1, $2)")
            .bind(owner_id)
            .bind(provider_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("bind owner", e))?;
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Directory Operations
// -------------------------------------------------------------------------

#[async_trait]
impl DirectoryStore for PgUnitOfWork {
    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn insert_provider(&mut self, input: &NewHostingProvider) -> StoreResult<HostingProvider> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_provider"])
            .start_timer();

        let row = sqlx::query_as::<_, ProviderRow>(
            r#"
            INSERT INTO hosting_providers (provider_id, request_id, name, description, website)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING provider_id, request_id, name, description, website, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.request_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.website)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create hosting provider", e))?;

        for (position, location) in input.locations.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO hosting_provider_locations (provider_id, position, city, country)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(row.provider_id)
            .bind(position as i32)
            .bind(&location.city)
            .bind(&location.country)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("create provider location", e))?;
        }

        timer.observe_duration();
        debug!(provider_id = %row.provider_id, "Hosting provider row inserted");

        Ok(row.with_locations(input.locations.clone()))
    }

    async fn get_provider(&mut self, provider_id: Uuid) -> StoreResult<Option<HostingProvider>> {
        let row = sqlx::query_as::<_, ProviderRow>(
            r#"
            SELECT provider_id, request_id, name, description, website, created_utc
            FROM hosting_providers
            WHERE provider_id = $1
            "#,
        )
        .bind(provider_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("get hosting provider", e))?;

        match row {
            Some(row) => Ok(self.hydrate_providers(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn provider_for_request(&mut self, request_id: Uuid) -> StoreResult<Option<HostingProvider>> {
        let row = sqlx::query_as::<_, ProviderRow>(
            r#"
            SELECT provider_id, request_id, name, description, website, created_utc
            FROM hosting_providers
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("get provider for request", e))?;

        match row {
            Some(row) => Ok(self.hydrate_providers(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_providers(&mut self) -> StoreResult<Vec<HostingProvider>> {
        let rows = sqlx::query_as::<_, ProviderRow>(
            r#"
            SELECT provider_id, request_id, name, description, website, created_utc
            FROM hosting_providers
            ORDER BY created_utc, provider_id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list hosting providers", e))?;

        self.hydrate_providers(rows).await
    }

    async fn set_provider_services(&mut self, provider_id: Uuid, tag_ids: &[Uuid]) -> StoreResult<()> {
        sqlx::query("DELETE FROM hosting_provider_services WHERE provider_id = $1")
            .bind(provider_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("clear provider services", e))?;

        sqlx::query(
            r#"
            INSERT INTO hosting_provider_services (provider_id, tag_id)
            SELECT $1, tag_id FROM UNNEST($2::uuid[]) AS t(tag_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(provider_id)
        .bind(tag_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("set provider services", e))?;

        Ok(())
    }

    async fn list_provider_services(&mut self, provider_id: Uuid) -> StoreResult<Vec<ServiceTag>> {
        sqlx::query_as::<_, ServiceTag>(
            r#"
            SELECT t.tag_id, t.slug, t.name
            FROM service_tags t
            JOIN hosting_provider_services s ON s.tag_id = t.tag_id
            WHERE s.provider_id = $1
            ORDER BY t.slug
            "#,
        )
        .bind(provider_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list provider services", e))
    }

    #[instrument(skip(self), fields(provider_id = %provider_id, asn = asn))]
    async fn insert_greencheck_asn(&mut self, provider_id: Uuid, asn: i64) -> StoreResult<GreencheckAsn> {
        sqlx::query_as::<_, GreencheckAsn>(
            r#"
            INSERT INTO greencheck_asns (asn_id, provider_id, asn, active)
            VALUES ($1, $2, $3, TRUE)
            RETURNING asn_id, provider_id, asn, active
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(provider_id)
        .bind(asn)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create ASN", e))
    }

    async fn find_greencheck_asn(&mut self, asn: i64) -> StoreResult<Option<GreencheckAsn>> {
        sqlx::query_as::<_, GreencheckAsn>(
            "SELECT asn_id, provider_id, asn, active FROM greencheck_asns WHERE asn = $1",
        )
        .bind(asn)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("find ASN", e))
    }

    async fn list_greencheck_asns(&mut self, provider_id: Uuid) -> StoreResult<Vec<GreencheckAsn>> {
        sqlx::query_as::<_, GreencheckAsn>(
            r#"
            SELECT asn_id, provider_id, asn, active
            FROM greencheck_asns
            WHERE provider_id = $1
            ORDER BY asn
            "#,
        )
        .bind(provider_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list ASNs", e))
    }

    async fn insert_greencheck_ip(
        &mut self,
        provider_id: Uuid,
        ip_start: IpAddr,
        ip_end: IpAddr,
    ) -> StoreResult<GreencheckIp> {
        let row = sqlx::query_as::<_, GreencheckIpRow>(
            r#"
            INSERT INTO greencheck_ips (ip_id, provider_id, ip_start, ip_end, active)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING ip_id, provider_id, ip_start, ip_end, active
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(provider_id)
        .bind(ip_start.to_string())
        .bind(ip_end.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create IP range", e))?;

        GreencheckIp::try_from(row)
    }

    async fn list_greencheck_ips(&mut self, provider_id: Uuid) -> StoreResult<Vec<GreencheckIp>> {
        let rows = sqlx::query_as::<_, GreencheckIpRow>(
            r#"
            SELECT ip_id, provider_id, ip_start, ip_end, active
            FROM greencheck_ips
            WHERE provider_id = $1
            ORDER BY position
            "#,
        )
        .bind(provider_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list IP ranges", e))?;

        convert_all(rows)
    }

    async fn insert_supporting_document(
        &mut self,
        input: &NewSupportingDocument,
    ) -> StoreResult<SupportingDocument> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO supporting_documents (document_id, provider_id, title, description, url, attachment, valid_from, valid_to, evidence_type, public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING document_id, provider_id, title, description, url, attachment, valid_from, valid_to, evidence_type, public
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.provider_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.url)
        .bind(&input.attachment)
        .bind(input.valid_from)
        .bind(input.valid_to)
        .bind(input.evidence_type.as_str())
        .bind(input.public)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create supporting document", e))?;

        SupportingDocument::try_from(row)
    }

    async fn list_supporting_documents(
        &mut self,
        provider_id: Uuid,
    ) -> StoreResult<Vec<SupportingDocument>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT document_id, provider_id, title, description, url, attachment, valid_from, valid_to, evidence_type, public
            FROM supporting_documents
            WHERE provider_id = $1
            ORDER BY position
            "#,
        )
        .bind(provider_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("list supporting documents", e))?;

        convert_all(rows)
    }
}
