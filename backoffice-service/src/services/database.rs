//! Database service for the back-office.
//!
//! Every tenant-owned query takes the caller's resolved `company_id` and
//! filters on it; client-supplied ids never widen the scope. Read-modify-
//! write correctness relies on guarded single-statement updates
//! (`WHERE status = ...`) rather than client-side locking.

use crate::models::{
    Company, CompanyStatus, CreateCompany, CreateCustomer, CreateExpense, CreateInvoice,
    CreateLoad, CreateProfile, CreateQuote, Customer, Expense, Invoice, InvoiceItem, LineInput,
    Load, Payment, Profile, Quote, QuoteItem, RecordPayment, Role, UpdateCompany, UpdateCustomer,
    UpdateExpense, UpdateInvoice, UpdateLoad, UpdateQuote,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::totals::{self, DocumentTotals};
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Count of rows per status value, used by the admin overview queries.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// One row of the super-admin company listing.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CompanyAccountSummary {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub user_count: i64,
    pub load_count: i64,
    pub created_at: chrono::DateTime<Utc>,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "backoffice-service"))]
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

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
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

    // -------------------------------------------------------------------------
    // Company Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_company(&self, input: &CreateCompany) -> Result<Company, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_company"])
            .start_timer();

        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (id, name, address, status)
            VALUES ($1, $2, $3, 'active')
            RETURNING id, name, address, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create company: {}", e)))?;

        timer.observe_duration();
        info!(company_id = %company.id, name = %company.name, "Company created");

        Ok(company)
    }

    /// Onboarding: create the company and its first admin profile in one
    /// transaction. The profile id is the identity provider's user id.
    #[instrument(skip(self, company), fields(email = %email))]
    pub async fn onboard_company(
        &self,
        user_id: Uuid,
        email: &str,
        full_name: &str,
        company: &CreateCompany,
    ) -> Result<(Company, Profile), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["onboard_company"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let created = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (id, name, address, status)
            VALUES ($1, $2, $3, 'active')
            RETURNING id, name, address, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&company.name)
        .bind(&company.address)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create company: {}", e)))?;

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, company_id, email, full_name, role)
            VALUES ($1, $2, $3, $4, 'company_admin')
            RETURNING id, company_id, email, full_name, role, is_active, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(created.id)
        .bind(email)
        .bind(full_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("This user is already registered"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create admin profile: {}", e)),
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit onboarding: {}", e))
        })?;

        timer.observe_duration();
        info!(company_id = %created.id, admin_id = %profile.id, "Company onboarded");

        Ok((created, profile))
    }

    pub async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>(
            "SELECT id, name, address, status, created_at, updated_at FROM companies WHERE id = $1",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get company: {}", e)))?;

        Ok(company)
    }

    pub async fn update_company(
        &self,
        company_id: Uuid,
        input: &UpdateCompany,
    ) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies
            SET name = COALESCE($2::text, name),
                address = COALESCE($3::text, address),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, address, status, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(&input.name)
        .bind(&input.address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update company: {}", e)))?;

        Ok(company)
    }

    #[instrument(skip(self))]
    pub async fn set_company_status(
        &self,
        company_id: Uuid,
        status: CompanyStatus,
    ) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, name, address, status, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set company status: {}", e))
        })?;

        Ok(company)
    }

    /// Super-admin listing with per-company user and load counts.
    pub async fn list_company_accounts(&self) -> Result<Vec<CompanyAccountSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_company_accounts"])
            .start_timer();

        let summaries = sqlx::query_as::<_, CompanyAccountSummary>(
            r#"
            SELECT c.id, c.name, c.status,
                   (SELECT count(*) FROM profiles p WHERE p.company_id = c.id) AS user_count,
                   (SELECT count(*) FROM loads l WHERE l.company_id = c.id) AS load_count,
                   c.created_at
            FROM companies c
            ORDER BY c.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list companies: {}", e))
        })?;

        timer.observe_duration();
        Ok(summaries)
    }

    // -------------------------------------------------------------------------
    // Profile Operations
    // -------------------------------------------------------------------------

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, company_id, email, full_name, role, is_active, created_at, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get profile: {}", e)))?;

        Ok(profile)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_profile(&self, input: &CreateProfile) -> Result<Profile, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_profile"])
            .start_timer();

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, company_id, email, full_name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, company_id, email, full_name, role, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(input.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A user with email '{}' already exists",
                    input.email
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create profile: {}", e)),
        })?;

        timer.observe_duration();
        info!(user_id = %profile.id, role = %profile.role, "Profile created");

        Ok(profile)
    }

    pub async fn list_profiles(&self, company_id: Uuid) -> Result<Vec<Profile>, AppError> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, company_id, email, full_name, role, is_active, created_at, updated_at
            FROM profiles
            WHERE company_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list profiles: {}", e)))?;

        Ok(profiles)
    }

    pub async fn get_company_profile(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, company_id, email, full_name, role, is_active, created_at, updated_at
            FROM profiles
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get profile: {}", e)))?;

        Ok(profile)
    }

    #[instrument(skip(self))]
    pub async fn update_profile_role(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET role = $3, updated_at = now()
            WHERE company_id = $1 AND id = $2
            RETURNING id, company_id, email, full_name, role, is_active, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update role: {}", e)))?;

        Ok(profile)
    }

    pub async fn set_profile_active(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET is_active = $3, updated_at = now()
            WHERE company_id = $1 AND id = $2
            RETURNING id, company_id, email, full_name, role, is_active, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update profile: {}", e))
        })?;

        Ok(profile)
    }

    #[instrument(skip(self))]
    pub async fn delete_profile(&self, company_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM profiles WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete profile: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Customer Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(company_id = %company_id))]
    pub async fn create_customer(
        &self,
        company_id: Uuid,
        input: &CreateCustomer,
    ) -> Result<Customer, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers
                (id, company_id, name, email, phone, billing_address, currency,
                 default_tax_rate, payment_terms_days)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, company_id, name, email, phone, billing_address, currency,
                      default_tax_rate, payment_terms_days, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.billing_address)
        .bind(&input.currency)
        .bind(input.default_tax_rate)
        .bind(input.payment_terms_days)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create customer: {}", e))
        })?;

        timer.observe_duration();
        info!(customer_id = %customer.id, "Customer created");

        Ok(customer)
    }

    pub async fn get_customer(
        &self,
        company_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, AppError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, company_id, name, email, phone, billing_address, currency,
                   default_tax_rate, payment_terms_days, is_active, created_at, updated_at
            FROM customers
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get customer: {}", e)))?;

        Ok(customer)
    }

    pub async fn list_customers(
        &self,
        company_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<Customer>, AppError> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, company_id, name, email, phone, billing_address, currency,
                   default_tax_rate, payment_terms_days, is_active, created_at, updated_at
            FROM customers
            WHERE company_id = $1 AND ($2::bool = TRUE OR is_active = TRUE)
            ORDER BY name
            "#,
        )
        .bind(company_id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list customers: {}", e)))?;

        Ok(customers)
    }

    pub async fn update_customer(
        &self,
        company_id: Uuid,
        customer_id: Uuid,
        input: &UpdateCustomer,
    ) -> Result<Option<Customer>, AppError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET name = COALESCE($3::text, name),
                email = COALESCE($4::text, email),
                phone = COALESCE($5::text, phone),
                billing_address = COALESCE($6::text, billing_address),
                currency = COALESCE($7::text, currency),
                default_tax_rate = COALESCE($8::numeric, default_tax_rate),
                payment_terms_days = COALESCE($9::int, payment_terms_days),
                updated_at = now()
            WHERE company_id = $1 AND id = $2
            RETURNING id, company_id, name, email, phone, billing_address, currency,
                      default_tax_rate, payment_terms_days, is_active, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.billing_address)
        .bind(&input.currency)
        .bind(input.default_tax_rate)
        .bind(input.payment_terms_days)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update customer: {}", e))
        })?;

        Ok(customer)
    }

    #[instrument(skip(self))]
    pub async fn set_customer_active(
        &self,
        company_id: Uuid,
        customer_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Customer>, AppError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET is_active = $3, updated_at = now()
            WHERE company_id = $1 AND id = $2
            RETURNING id, company_id, name, email, phone, billing_address, currency,
                      default_tax_rate, payment_terms_days, is_active, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(customer_id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update customer: {}", e))
        })?;

        Ok(customer)
    }

    /// Loads that prevent the customer from being deactivated.
    pub async fn count_blocking_loads(
        &self,
        company_id: Uuid,
        customer_id: Uuid,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT count(*) FROM loads
            WHERE company_id = $1 AND customer_id = $2
              AND status IN ('pending', 'assigned', 'in_transit')
            "#,
        )
        .bind(company_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count loads: {}", e)))?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Quote Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input, totals), fields(company_id = %company_id))]
    pub async fn create_quote(
        &self,
        company_id: Uuid,
        created_by: Uuid,
        quote_number: &str,
        input: &CreateQuote,
        totals: &DocumentTotals,
    ) -> Result<Quote, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_quote"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let quote = sqlx::query_as::<_, Quote>(
            r#"
            INSERT INTO quotes
                (id, company_id, customer_id, quote_number, currency, tax_rate,
                 subtotal, tax_amount, total_amount, status, valid_until, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'draft', $10, $11, $12)
            RETURNING id, company_id, customer_id, quote_number, currency, tax_rate,
                      subtotal, tax_amount, total_amount, status, valid_until, notes,
                      converted_to_invoice_id, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(input.customer_id)
        .bind(quote_number)
        .bind(&input.currency)
        .bind(input.tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(input.valid_until)
        .bind(&input.notes)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Quote number '{}' already exists",
                    quote_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create quote: {}", e)),
        })?;

        Self::insert_quote_items(&mut tx, quote.id, &input.items).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit quote: {}", e))
        })?;

        timer.observe_duration();
        info!(quote_id = %quote.id, quote_number = %quote.quote_number, "Quote created");

        Ok(quote)
    }

    async fn insert_quote_items(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        quote_id: Uuid,
        items: &[LineInput],
    ) -> Result<(), AppError> {
        for (index, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO quote_items
                    (id, quote_id, position, description, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(quote_id)
            .bind(index as i32 + 1)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(totals::line_total(item.quantity, item.unit_price))
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert quote item: {}", e))
            })?;
        }
        Ok(())
    }

    pub async fn get_quote(
        &self,
        company_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Option<Quote>, AppError> {
        let quote = sqlx::query_as::<_, Quote>(
            r#"
            SELECT id, company_id, customer_id, quote_number, currency, tax_rate,
                   subtotal, tax_amount, total_amount, status, valid_until, notes,
                   converted_to_invoice_id, created_by, created_at, updated_at
            FROM quotes
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(quote_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quote: {}", e)))?;

        Ok(quote)
    }

    pub async fn get_quote_items(&self, quote_id: Uuid) -> Result<Vec<QuoteItem>, AppError> {
        let items = sqlx::query_as::<_, QuoteItem>(
            r#"
            SELECT id, quote_id, position, description, quantity, unit_price, line_total
            FROM quote_items
            WHERE quote_id = $1
            ORDER BY position
            "#,
        )
        .bind(quote_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get quote items: {}", e))
        })?;

        Ok(items)
    }

    pub async fn list_quotes(
        &self,
        company_id: Uuid,
        status: Option<String>,
        customer_id: Option<Uuid>,
    ) -> Result<Vec<Quote>, AppError> {
        let quotes = sqlx::query_as::<_, Quote>(
            r#"
            SELECT id, company_id, customer_id, quote_number, currency, tax_rate,
                   subtotal, tax_amount, total_amount, status, valid_until, notes,
                   converted_to_invoice_id, created_by, created_at, updated_at
            FROM quotes
            WHERE company_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR customer_id = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(company_id)
        .bind(status)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list quotes: {}", e)))?;

        Ok(quotes)
    }

    /// Update a quote's fields and, when items are supplied, replace the
    /// item rows and the stored totals in the same transaction. The status
    /// guard makes the editability check race-safe: a quote accepted or
    /// converted between the caller's read and this write is left untouched.
    #[instrument(skip(self, input, totals), fields(company_id = %company_id, quote_id = %quote_id))]
    pub async fn update_quote(
        &self,
        company_id: Uuid,
        quote_id: Uuid,
        input: &UpdateQuote,
        totals: Option<&DocumentTotals>,
    ) -> Result<Option<Quote>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_quote"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let quote = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET customer_id = COALESCE($3::uuid, customer_id),
                currency = COALESCE($4::text, currency),
                tax_rate = COALESCE($5::numeric, tax_rate),
                valid_until = COALESCE($6::date, valid_until),
                notes = COALESCE($7::text, notes),
                subtotal = COALESCE($8::numeric, subtotal),
                tax_amount = COALESCE($9::numeric, tax_amount),
                total_amount = COALESCE($10::numeric, total_amount),
                updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status IN ('draft', 'sent')
            RETURNING id, company_id, customer_id, quote_number, currency, tax_rate,
                      subtotal, tax_amount, total_amount, status, valid_until, notes,
                      converted_to_invoice_id, created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(quote_id)
        .bind(input.customer_id)
        .bind(&input.currency)
        .bind(input.tax_rate)
        .bind(input.valid_until)
        .bind(&input.notes)
        .bind(totals.map(|t| t.subtotal))
        .bind(totals.map(|t| t.tax_amount))
        .bind(totals.map(|t| t.total_amount))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update quote: {}", e)))?;

        let Some(quote) = quote else {
            return Ok(None);
        };

        if let Some(items) = &input.items {
            sqlx::query("DELETE FROM quote_items WHERE quote_id = $1")
                .bind(quote_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to clear quote items: {}", e))
                })?;
            Self::insert_quote_items(&mut tx, quote_id, items).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit quote update: {}", e))
        })?;

        timer.observe_duration();
        Ok(Some(quote))
    }

    /// Guarded status change: only applies when the stored status still
    /// matches `expected`, so racing writers cannot skip a precondition.
    pub async fn set_quote_status(
        &self,
        company_id: Uuid,
        quote_id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<Option<Quote>, AppError> {
        let quote = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET status = $4, updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status = $3
            RETURNING id, company_id, customer_id, quote_number, currency, tax_rate,
                      subtotal, tax_amount, total_amount, status, valid_until, notes,
                      converted_to_invoice_id, created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(quote_id)
        .bind(expected)
        .bind(next)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set quote status: {}", e))
        })?;

        Ok(quote)
    }

    pub async fn delete_draft_quote(
        &self,
        company_id: Uuid,
        quote_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM quotes WHERE company_id = $1 AND id = $2 AND status = 'draft'",
        )
        .bind(company_id)
        .bind(quote_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete quote: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Convert an accepted quote into an invoice in one transaction: insert
    /// the invoice, copy the quote's items, and mark the quote converted.
    #[instrument(skip(self, quote, items), fields(company_id = %quote.company_id, quote_id = %quote.id))]
    pub async fn convert_quote_to_invoice(
        &self,
        quote: &Quote,
        items: &[QuoteItem],
        invoice_number: &str,
        due_date: Option<chrono::NaiveDate>,
        load_id: Option<Uuid>,
        created_by: Uuid,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_quote_to_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices
                (id, company_id, customer_id, quote_id, load_id, invoice_number, currency,
                 tax_rate, subtotal, tax_amount, total_amount, status, due_date, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', $12, $13)
            RETURNING id, company_id, customer_id, quote_id, load_id, invoice_number, currency,
                      tax_rate, subtotal, tax_amount, total_amount, amount_paid, status,
                      due_date, paid_at, notes, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(quote.company_id)
        .bind(quote.customer_id)
        .bind(quote.id)
        .bind(load_id)
        .bind(invoice_number)
        .bind(&quote.currency)
        .bind(quote.tax_rate)
        .bind(quote.subtotal)
        .bind(quote.tax_amount)
        .bind(quote.total_amount)
        .bind(due_date)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e))
        })?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items
                    (id, invoice_id, position, description, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice.id)
            .bind(item.position)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to copy quote item: {}", e))
            })?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE quotes
            SET status = 'converted', converted_to_invoice_id = $3, updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status IN ('accepted', 'approved')
            "#,
        )
        .bind(quote.company_id)
        .bind(quote.id)
        .bind(invoice.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark quote converted: {}", e))
        })?;

        if updated.rows_affected() == 0 {
            // Another caller converted it first; the transaction rolls back
            // on drop and the invoice insert disappears with it.
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Quote is no longer eligible for conversion"
            )));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit conversion: {}", e))
        })?;

        timer.observe_duration();
        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            "Quote converted to invoice"
        );

        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input, totals), fields(company_id = %company_id))]
    pub async fn create_invoice(
        &self,
        company_id: Uuid,
        created_by: Uuid,
        invoice_number: &str,
        input: &CreateInvoice,
        totals: &DocumentTotals,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices
                (id, company_id, customer_id, quote_id, load_id, invoice_number, currency,
                 tax_rate, subtotal, tax_amount, total_amount, status, due_date, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', $12, $13, $14)
            RETURNING id, company_id, customer_id, quote_id, load_id, invoice_number, currency,
                      tax_rate, subtotal, tax_amount, total_amount, amount_paid, status,
                      due_date, paid_at, notes, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(input.customer_id)
        .bind(input.quote_id)
        .bind(input.load_id)
        .bind(invoice_number)
        .bind(&input.currency)
        .bind(input.tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(input.due_date)
        .bind(&input.notes)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number '{}' already exists",
                    invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        Self::insert_invoice_items(&mut tx, invoice.id, &input.items).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();
        info!(invoice_id = %invoice.id, invoice_number = %invoice.invoice_number, "Invoice created");

        Ok(invoice)
    }

    async fn insert_invoice_items(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        invoice_id: Uuid,
        items: &[LineInput],
    ) -> Result<(), AppError> {
        for (index, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_items
                    (id, invoice_id, position, description, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(index as i32 + 1)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(totals::line_total(item.quantity, item.unit_price))
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice item: {}", e))
            })?;
        }
        Ok(())
    }

    pub async fn get_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, company_id, customer_id, quote_id, load_id, invoice_number, currency,
                   tax_rate, subtotal, tax_amount, total_amount, amount_paid, status,
                   due_date, paid_at, notes, created_by, created_at, updated_at
            FROM invoices
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        Ok(invoice)
    }

    pub async fn get_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, position, description, quantity, unit_price, line_total
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY position
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice items: {}", e))
        })?;

        Ok(items)
    }

    pub async fn list_invoices(
        &self,
        company_id: Uuid,
        status: Option<String>,
        customer_id: Option<Uuid>,
    ) -> Result<Vec<Invoice>, AppError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, company_id, customer_id, quote_id, load_id, invoice_number, currency,
                   tax_rate, subtotal, tax_amount, total_amount, amount_paid, status,
                   due_date, paid_at, notes, created_by, created_at, updated_at
            FROM invoices
            WHERE company_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR customer_id = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(company_id)
        .bind(status)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        Ok(invoices)
    }

    #[instrument(skip(self, input, totals), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        input: &UpdateInvoice,
        totals: Option<&DocumentTotals>,
    ) -> Result<Option<Invoice>, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET due_date = COALESCE($3::date, due_date),
                notes = COALESCE($4::text, notes),
                subtotal = COALESCE($5::numeric, subtotal),
                tax_amount = COALESCE($6::numeric, tax_amount),
                total_amount = COALESCE($7::numeric, total_amount),
                updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status = 'pending'
            RETURNING id, company_id, customer_id, quote_id, load_id, invoice_number, currency,
                      tax_rate, subtotal, tax_amount, total_amount, amount_paid, status,
                      due_date, paid_at, notes, created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(invoice_id)
        .bind(input.due_date)
        .bind(&input.notes)
        .bind(totals.map(|t| t.subtotal))
        .bind(totals.map(|t| t.tax_amount))
        .bind(totals.map(|t| t.total_amount))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e))
        })?;

        let Some(invoice) = invoice else {
            return Ok(None);
        };

        if let Some(items) = &input.items {
            sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to clear invoice items: {}", e))
                })?;
            Self::insert_invoice_items(&mut tx, invoice_id, items).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice update: {}", e))
        })?;

        Ok(Some(invoice))
    }

    /// Single-statement paid transition; returns None when the invoice is
    /// not in `pending` (the idempotent path is decided by the caller from
    /// the fetched row).
    #[instrument(skip(self))]
    pub async fn set_invoice_paid(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = 'paid', amount_paid = total_amount, paid_at = now(), updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status = 'pending'
            RETURNING id, company_id, customer_id, quote_id, load_id, invoice_number, currency,
                      tax_rate, subtotal, tax_amount, total_amount, amount_paid, status,
                      due_date, paid_at, notes, created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark invoice paid: {}", e))
        })?;

        Ok(invoice)
    }

    /// Guarded status change mirroring `set_quote_status`.
    pub async fn set_invoice_status(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = $4, updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status = $3
            RETURNING id, company_id, customer_id, quote_id, load_id, invoice_number, currency,
                      tax_rate, subtotal, tax_amount, total_amount, amount_paid, status,
                      due_date, paid_at, notes, created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(invoice_id)
        .bind(expected)
        .bind(next)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set invoice status: {}", e))
        })?;

        Ok(invoice)
    }

    pub async fn delete_pending_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM invoices WHERE company_id = $1 AND id = $2 AND status = 'pending'",
        )
        .bind(company_id)
        .bind(invoice_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Load Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(company_id = %company_id))]
    pub async fn create_load(
        &self,
        company_id: Uuid,
        created_by: Uuid,
        load_number: &str,
        input: &CreateLoad,
    ) -> Result<Load, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_load"])
            .start_timer();

        let load = sqlx::query_as::<_, Load>(
            r#"
            INSERT INTO loads
                (id, company_id, customer_id, quote_id, load_number, origin, destination,
                 pickup_date, delivery_date, status, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $11)
            RETURNING id, company_id, customer_id, quote_id, load_number, origin, destination,
                      pickup_date, delivery_date, driver_id, vehicle_unit, status, notes,
                      created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(input.customer_id)
        .bind(input.quote_id)
        .bind(load_number)
        .bind(&input.origin)
        .bind(&input.destination)
        .bind(input.pickup_date)
        .bind(input.delivery_date)
        .bind(&input.notes)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Load number '{}' already exists",
                    load_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create load: {}", e)),
        })?;

        timer.observe_duration();
        info!(load_id = %load.id, load_number = %load.load_number, "Load created");

        Ok(load)
    }

    pub async fn get_load(&self, company_id: Uuid, load_id: Uuid) -> Result<Option<Load>, AppError> {
        let load = sqlx::query_as::<_, Load>(
            r#"
            SELECT id, company_id, customer_id, quote_id, load_number, origin, destination,
                   pickup_date, delivery_date, driver_id, vehicle_unit, status, notes,
                   created_by, created_at, updated_at
            FROM loads
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(load_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get load: {}", e)))?;

        Ok(load)
    }

    pub async fn list_loads(
        &self,
        company_id: Uuid,
        status: Option<String>,
        driver_id: Option<Uuid>,
    ) -> Result<Vec<Load>, AppError> {
        let loads = sqlx::query_as::<_, Load>(
            r#"
            SELECT id, company_id, customer_id, quote_id, load_number, origin, destination,
                   pickup_date, delivery_date, driver_id, vehicle_unit, status, notes,
                   created_by, created_at, updated_at
            FROM loads
            WHERE company_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR driver_id = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(company_id)
        .bind(status)
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list loads: {}", e)))?;

        Ok(loads)
    }

    pub async fn update_load(
        &self,
        company_id: Uuid,
        load_id: Uuid,
        input: &UpdateLoad,
    ) -> Result<Option<Load>, AppError> {
        let load = sqlx::query_as::<_, Load>(
            r#"
            UPDATE loads
            SET origin = COALESCE($3::text, origin),
                destination = COALESCE($4::text, destination),
                pickup_date = COALESCE($5::date, pickup_date),
                delivery_date = COALESCE($6::date, delivery_date),
                notes = COALESCE($7::text, notes),
                updated_at = now()
            WHERE company_id = $1 AND id = $2
            RETURNING id, company_id, customer_id, quote_id, load_number, origin, destination,
                      pickup_date, delivery_date, driver_id, vehicle_unit, status, notes,
                      created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(load_id)
        .bind(&input.origin)
        .bind(&input.destination)
        .bind(input.pickup_date)
        .bind(input.delivery_date)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update load: {}", e)))?;

        Ok(load)
    }

    /// Assign a driver and/or vehicle. The load moves to `assigned` when it
    /// was pending; an already-assigned load keeps its status.
    #[instrument(skip(self))]
    pub async fn assign_load(
        &self,
        company_id: Uuid,
        load_id: Uuid,
        driver_id: Uuid,
        vehicle_unit: Option<&str>,
    ) -> Result<Option<Load>, AppError> {
        let load = sqlx::query_as::<_, Load>(
            r#"
            UPDATE loads
            SET driver_id = $3,
                vehicle_unit = COALESCE($4::text, vehicle_unit),
                status = 'assigned',
                updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status IN ('pending', 'assigned')
            RETURNING id, company_id, customer_id, quote_id, load_number, origin, destination,
                      pickup_date, delivery_date, driver_id, vehicle_unit, status, notes,
                      created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(load_id)
        .bind(driver_id)
        .bind(vehicle_unit)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to assign load: {}", e)))?;

        Ok(load)
    }

    /// Guarded status change; clears the driver when a load reopens to
    /// pending so a stale assignment cannot leak into the next dispatch.
    pub async fn set_load_status(
        &self,
        company_id: Uuid,
        load_id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<Option<Load>, AppError> {
        let load = sqlx::query_as::<_, Load>(
            r#"
            UPDATE loads
            SET status = $4,
                driver_id = CASE WHEN $4 = 'pending' THEN NULL ELSE driver_id END,
                updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status = $3
            RETURNING id, company_id, customer_id, quote_id, load_number, origin, destination,
                      pickup_date, delivery_date, driver_id, vehicle_unit, status, notes,
                      created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(load_id)
        .bind(expected)
        .bind(next)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set load status: {}", e))
        })?;

        Ok(load)
    }

    pub async fn delete_pending_load(
        &self,
        company_id: Uuid,
        load_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM loads WHERE company_id = $1 AND id = $2 AND status = 'pending'",
        )
        .bind(company_id)
        .bind(load_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete load: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Expense Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(company_id = %company_id))]
    pub async fn create_expense(
        &self,
        company_id: Uuid,
        created_by: Uuid,
        input: &CreateExpense,
    ) -> Result<Expense, AppError> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses
                (id, company_id, category, description, amount, currency, status,
                 load_id, vehicle_unit, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9)
            RETURNING id, company_id, category, description, amount, currency, status,
                      load_id, vehicle_unit, receipt_path, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(&input.category)
        .bind(&input.description)
        .bind(input.amount)
        .bind(&input.currency)
        .bind(input.load_id)
        .bind(&input.vehicle_unit)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create expense: {}", e)))?;

        info!(expense_id = %expense.id, category = %expense.category, "Expense created");

        Ok(expense)
    }

    pub async fn get_expense(
        &self,
        company_id: Uuid,
        expense_id: Uuid,
    ) -> Result<Option<Expense>, AppError> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, company_id, category, description, amount, currency, status,
                   load_id, vehicle_unit, receipt_path, created_by, created_at, updated_at
            FROM expenses
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(expense_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get expense: {}", e)))?;

        Ok(expense)
    }

    pub async fn list_expenses(
        &self,
        company_id: Uuid,
        status: Option<String>,
    ) -> Result<Vec<Expense>, AppError> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, company_id, category, description, amount, currency, status,
                   load_id, vehicle_unit, receipt_path, created_by, created_at, updated_at
            FROM expenses
            WHERE company_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(company_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list expenses: {}", e)))?;

        Ok(expenses)
    }

    pub async fn update_expense(
        &self,
        company_id: Uuid,
        expense_id: Uuid,
        input: &UpdateExpense,
    ) -> Result<Option<Expense>, AppError> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
            SET category = COALESCE($3::text, category),
                description = COALESCE($4::text, description),
                amount = COALESCE($5::numeric, amount),
                currency = COALESCE($6::text, currency),
                load_id = COALESCE($7::uuid, load_id),
                vehicle_unit = COALESCE($8::text, vehicle_unit),
                updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status = 'pending'
            RETURNING id, company_id, category, description, amount, currency, status,
                      load_id, vehicle_unit, receipt_path, created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(expense_id)
        .bind(&input.category)
        .bind(&input.description)
        .bind(input.amount)
        .bind(&input.currency)
        .bind(input.load_id)
        .bind(&input.vehicle_unit)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update expense: {}", e)))?;

        Ok(expense)
    }

    /// Approve or reject a pending expense.
    #[instrument(skip(self))]
    pub async fn set_expense_status(
        &self,
        company_id: Uuid,
        expense_id: Uuid,
        next: &str,
    ) -> Result<Option<Expense>, AppError> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
            SET status = $3, updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status = 'pending'
            RETURNING id, company_id, category, description, amount, currency, status,
                      load_id, vehicle_unit, receipt_path, created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(expense_id)
        .bind(next)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set expense status: {}", e))
        })?;

        Ok(expense)
    }

    pub async fn set_expense_receipt(
        &self,
        company_id: Uuid,
        expense_id: Uuid,
        receipt_path: &str,
    ) -> Result<Option<Expense>, AppError> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
            SET receipt_path = $3, updated_at = now()
            WHERE company_id = $1 AND id = $2
            RETURNING id, company_id, category, description, amount, currency, status,
                      load_id, vehicle_unit, receipt_path, created_by, created_at, updated_at
            "#,
        )
        .bind(company_id)
        .bind(expense_id)
        .bind(receipt_path)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to attach receipt: {}", e))
        })?;

        Ok(expense)
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(company_id = %company_id, invoice_id = %input.invoice_id))]
    pub async fn insert_payment(
        &self,
        company_id: Uuid,
        input: &RecordPayment,
    ) -> Result<Payment, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
                (id, company_id, invoice_id, amount, currency, kind, method, gateway_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, company_id, invoice_id, amount, currency, kind, method,
                      gateway_reference, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(input.invoice_id)
        .bind(input.amount)
        .bind(&input.currency)
        .bind(input.kind.as_str())
        .bind(&input.method)
        .bind(&input.gateway_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        info!(payment_id = %payment.id, kind = %payment.kind, "Payment recorded");

        Ok(payment)
    }

    /// Total refunded so far against an invoice.
    pub async fn sum_refunds(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Decimal, AppError> {
        let sum: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM payments
            WHERE company_id = $1 AND invoice_id = $2 AND kind = 'refund'
            "#,
        )
        .bind(company_id)
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum refunds: {}", e)))?;

        Ok(sum)
    }

    pub async fn list_payments(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, company_id, invoice_id, amount, currency, kind, method,
                   gateway_reference, created_at
            FROM payments
            WHERE company_id = $1 AND invoice_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(company_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        Ok(payments)
    }

    // -------------------------------------------------------------------------
    // Reporting Operations
    // -------------------------------------------------------------------------

    pub async fn count_loads_by_status(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<StatusCount>, AppError> {
        let counts = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, count(*) AS count
            FROM loads
            WHERE company_id = $1
            GROUP BY status
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count loads: {}", e)))?;

        Ok(counts)
    }

    /// Sum of invoice totals for a given stored status.
    pub async fn sum_invoice_totals(
        &self,
        company_id: Uuid,
        status: &str,
    ) -> Result<Decimal, AppError> {
        let sum: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_amount), 0)
            FROM invoices
            WHERE company_id = $1 AND status = $2
            "#,
        )
        .bind(company_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum invoices: {}", e)))?;

        Ok(sum)
    }
}
