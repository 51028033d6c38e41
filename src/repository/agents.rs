//! Agents repository

use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::{
    error::AppResult,
    models::agent::{Agent, NewAgent},
    services::local_time,
};

#[derive(Clone)]
pub struct AgentsRepository {
    pool: Pool<Sqlite>,
}

impl AgentsRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Get agent by ID
    pub async fn get_by_id(&self, id: &str) -> AppResult<Option<Agent>> {
        let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(agent)
    }

    /// Agents allowed to log in
    pub async fn list_active(&self) -> AppResult<Vec<Agent>> {
        let agents = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE active = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(agents)
    }

    pub async fn create(&self, agent: &NewAgent) -> AppResult<Agent> {
        let now = local_time::format_utc(Utc::now());
        let created = sqlx::query_as::<_, Agent>(
            r#"
            INSERT INTO agents (
                id, first_name, last_name, role, phone, pin_hash, is_manager, active,
                created_at_utc, updated_at_utc
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.first_name)
        .bind(&agent.last_name)
        .bind(&agent.role)
        .bind(&agent.phone)
        .bind(&agent.pin_hash)
        .bind(agent.is_manager)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }
}
