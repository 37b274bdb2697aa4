//! Database service for subscription-service.

use crate::models::{HistoryQuery, MealHistoryEntry, PlanTier, SubscriptionSnapshot, UserPlan};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "subscription-service"))]
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

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

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

    // =========================================================================
    // Profile / plan operations
    // =========================================================================

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user_plan(&self, user_id: Uuid) -> Result<Option<UserPlan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, UserPlan>(
            r#"
            SELECT user_id, email, plan, plan_expires_at, updated_utc
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user plan: {}", e)))?;

        timer.observe_duration();

        Ok(plan)
    }

    #[instrument(skip(self, email))]
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserPlan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_user_by_email"])
            .start_timer();

        let plan = sqlx::query_as::<_, UserPlan>(
            r#"
            SELECT user_id, email, plan, plan_expires_at, updated_utc
            FROM profiles
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find user by email: {}", e))
        })?;

        timer.observe_duration();

        Ok(plan)
    }

    /// Write a user's tier. Paid tiers expire `duration_days` from now; a
    /// duration of zero clears the expiry.
    ///
    /// Plain assignment, so replaying the same update is harmless.
    #[instrument(skip(self), fields(user_id = %user_id, tier = %tier))]
    pub async fn update_user_plan(
        &self,
        user_id: Uuid,
        tier: PlanTier,
        duration_days: i32,
    ) -> Result<UserPlan, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_user_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, UserPlan>(
            r#"
            UPDATE profiles
            SET plan = $2,
                plan_expires_at = CASE
                    WHEN $3 > 0 THEN NOW() + make_interval(days => $3)
                    ELSE NULL
                END,
                updated_utc = NOW()
            WHERE user_id = $1
            RETURNING user_id, email, plan, plan_expires_at, updated_utc
            "#,
        )
        .bind(user_id)
        .bind(tier.as_str())
        .bind(duration_days)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update plan: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Profile {} not found", user_id)))?;

        timer.observe_duration();
        info!(plan = %plan.plan, expires_at = ?plan.plan_expires_at, "User plan updated");

        Ok(plan)
    }

    // =========================================================================
    // Subscription snapshots
    // =========================================================================

    #[instrument(skip(self, snapshot), fields(subscription_key = %snapshot.subscription_key))]
    pub async fn upsert_subscription(&self, snapshot: &SubscriptionSnapshot) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_subscription"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO subscriptions (subscription_key, user_id, customer_email, provider_status, state, plan, plan_identifier, raw, synced_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (subscription_key) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                customer_email = EXCLUDED.customer_email,
                provider_status = EXCLUDED.provider_status,
                state = EXCLUDED.state,
                plan = EXCLUDED.plan,
                plan_identifier = EXCLUDED.plan_identifier,
                raw = EXCLUDED.raw,
                synced_utc = EXCLUDED.synced_utc
            "#,
        )
        .bind(&snapshot.subscription_key)
        .bind(snapshot.user_id)
        .bind(&snapshot.customer_email)
        .bind(&snapshot.provider_status)
        .bind(&snapshot.state)
        .bind(&snapshot.plan)
        .bind(&snapshot.plan_identifier)
        .bind(&snapshot.raw)
        .bind(snapshot.synced_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to upsert subscription: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_subscriptions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<SubscriptionSnapshot>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_subscriptions_for_user"])
            .start_timer();

        let snapshots = sqlx::query_as::<_, SubscriptionSnapshot>(
            r#"
            SELECT subscription_key, user_id, customer_email, provider_status, state, plan, plan_identifier, raw, synced_utc
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY synced_utc DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list subscriptions: {}", e))
        })?;

        timer.observe_duration();

        Ok(snapshots)
    }

    // =========================================================================
    // Meal history
    // =========================================================================

    /// Read meal history through `get_meal_history_limited`.
    ///
    /// The day ceiling is always bound; the function applies it together with
    /// any explicit range. Either every row in the window comes back or the
    /// call fails.
    #[instrument(skip(self), fields(requester_id = %query.requester_id, days = query.window.days))]
    pub async fn fetch_meal_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<MealHistoryEntry>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_meal_history"])
            .start_timer();

        let entries = sqlx::query_as::<_, MealHistoryEntry>(
            r#"
            SELECT entry_id, user_id, consumed_at, meal_name, calories, protein_g, carbs_g, fat_g, created_utc
            FROM get_meal_history_limited($1, $2, $3, $4)
            "#,
        )
        .bind(query.requester_id)
        .bind(query.window.days)
        .bind(query.window.start)
        .bind(query.window.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch meal history: {}", e))
        })?;

        timer.observe_duration();

        Ok(entries)
    }
}
