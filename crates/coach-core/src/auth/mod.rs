//! Service-token authentication.
//!
//! The front end holds a random 256-bit token, shared through a 0600 file,
//! and names the acting user on every request. Credential issuance for end
//! users happens elsewhere.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::SystemTime;
use tracing::info;

use crate::error::{Error, Result};

/// Service token for front-end to backend communication
#[derive(Debug, Clone)]
pub struct ServiceToken {
    /// Random 256-bit token
    pub token: [u8; 32],
    /// Creation timestamp (for rotation)
    pub created_at: SystemTime,
    /// Token ID for logging
    pub token_id: uuid::Uuid,
}

impl ServiceToken {
    /// Generate a new service token
    pub fn generate() -> Self {
        let mut token = [0u8; 32];
        for byte in &mut token {
            *byte = rand::random();
        }

        Self {
            token,
            created_at: SystemTime::now(),
            token_id: uuid::Uuid::new_v4(),
        }
    }

    /// Base64 form, as sent in the `Authorization` header
    pub fn encoded(&self) -> String {
        STANDARD.encode(self.token)
    }

    /// Write token to file with restricted permissions (0600)
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.encoded())?;
        fs::set_permissions(path, Permissions::from_mode(0o600))?;
        Ok(())
    }

    /// Read token from file
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let encoded = fs::read_to_string(path)?;
        let token = Self::decode(encoded.trim())?;

        Ok(Self {
            token,
            created_at: SystemTime::now(),
            token_id: uuid::Uuid::new_v4(),
        })
    }

    /// Read the token at `path`, generating and writing one if absent
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::read_from_file(path);
        }

        let token = Self::generate();
        token.write_to_file(path)?;
        info!(path = %path.display(), token_id = %token.token_id, "Generated service token");
        Ok(token)
    }

    fn decode(encoded: &str) -> Result<[u8; 32]> {
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Other(format!("Invalid token encoding: {}", e)))?;

        if decoded.len() != 32 {
            return Err(Error::InvalidToken);
        }

        let mut token = [0u8; 32];
        token.copy_from_slice(&decoded);
        Ok(token)
    }

    /// Verify a token matches
    pub fn verify(&self, candidate: &[u8]) -> bool {
        if candidate.len() != self.token.len() {
            return false;
        }
        // Constant-time comparison
        candidate
            .iter()
            .zip(self.token.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Verify the base64 form of a token
    pub fn verify_encoded(&self, candidate: &str) -> bool {
        Self::decode(candidate.trim())
            .map(|bytes| self.verify(&bytes))
            .unwrap_or(false)
    }
}

/// Authenticated caller extracted from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// Whether the caller owns a resource belonging to `owner_id`
    pub fn owns(&self, owner_id: &str) -> bool {
        self.user_id == owner_id
    }
}
