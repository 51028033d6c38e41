//! Staff agent model and token claims

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;

/// Agent row from database
#[derive(Debug, Clone, FromRow)]
pub struct Agent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub phone: Option<String>,
    /// Argon2 PHC string; never leaves the server
    pub pin_hash: String,
    pub is_manager: bool,
    pub active: bool,
    pub created_at_utc: String,
    pub updated_at_utc: String,
}

/// Public agent profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub phone: Option<String>,
    pub is_manager: bool,
}

impl From<&Agent> for AgentProfile {
    fn from(agent: &Agent) -> Self {
        AgentProfile {
            id: agent.id.clone(),
            first_name: agent.first_name.clone(),
            last_name: agent.last_name.clone(),
            role: agent.role.clone(),
            phone: agent.phone.clone(),
            is_manager: agent.is_manager,
        }
    }
}

/// Agent to insert (PIN already hashed)
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub phone: Option<String>,
    pub pin_hash: String,
    pub is_manager: bool,
}

/// JWT claims for authenticated agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentClaims {
    /// Agent id
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl AgentClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and verify a JWT token, including expiry
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

impl Agent {
    /// Require the manager flag
    pub fn require_manager(&self) -> Result<(), AppError> {
        if self.is_manager {
            Ok(())
        } else {
            Err(AppError::Authorization("Manager access required".to_string()))
        }
    }
}
