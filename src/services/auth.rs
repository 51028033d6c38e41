//! PIN authentication, token issuance and default agent seeding

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::agent::{Agent, AgentClaims, NewAgent},
    repository::Repository,
};

pub const DEFAULT_AGENT_ID: &str = "agent-lino";
pub const MANAGER_AGENT_ID: &str = "hotel-manager";
const DEFAULT_AGENT_PIN: &str = "1234";

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Hash a PIN using Argon2
    pub fn hash_pin(pin: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash PIN: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify_pin(agent: &Agent, pin: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&agent.pin_hash)
            .map_err(|_| AppError::Internal("Invalid PIN hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(pin.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Find the active agent owning this PIN and issue a token
    pub async fn login(&self, pin: &str) -> AppResult<(String, Agent)> {
        let pin = pin.trim();
        if pin.is_empty() {
            return Err(AppError::BadRequest("PIN is required".to_string()));
        }

        // PINs are salted, so every active agent has to be checked
        for agent in self.repository.agents.list_active().await? {
            if Self::verify_pin(&agent, pin)? {
                let token = self.create_token(&agent)?;
                tracing::info!(agent_id = %agent.id, "Agent logged in");
                return Ok((token, agent));
            }
        }

        tracing::warn!("Login attempt with unknown PIN");
        Err(AppError::Authentication("Invalid credentials".to_string()))
    }

    fn create_token(&self, agent: &Agent) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = AgentClaims {
            sub: agent.id.clone(),
            role: agent.role.clone(),
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Resolve a bearer token to an agent that is still active
    pub async fn authenticate_token(&self, token: &str) -> AppResult<Agent> {
        let claims = AgentClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))?;

        match self.repository.agents.get_by_id(&claims.sub).await? {
            Some(agent) if agent.active => Ok(agent),
            _ => Err(AppError::Authentication("Agent is no longer active".to_string())),
        }
    }

    /// Create the default valet agent and manager on an empty store
    pub async fn seed_default_agents(&self) -> AppResult<()> {
        if self.repository.agents.count().await? > 0 {
            return Ok(());
        }

        let defaults = [
            NewAgent {
                id: DEFAULT_AGENT_ID.to_string(),
                first_name: "Lino".to_string(),
                last_name: "Bellini".to_string(),
                role: "Valet Parking Agent".to_string(),
                phone: Some("(786)867-8209".to_string()),
                pin_hash: Self::hash_pin(DEFAULT_AGENT_PIN)?,
                is_manager: false,
            },
            NewAgent {
                id: MANAGER_AGENT_ID.to_string(),
                first_name: "Hotel".to_string(),
                last_name: "Manager".to_string(),
                role: "Hotel Manager".to_string(),
                phone: None,
                pin_hash: Self::hash_pin(&self.config.manager_pin)?,
                is_manager: true,
            },
        ];

        for agent in &defaults {
            self.repository.agents.create(agent).await?;
            tracing::info!(agent_id = %agent.id, "Seeded default agent");
        }
        Ok(())
    }
}
