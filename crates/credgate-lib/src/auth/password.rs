// ============================
// credgate-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use credgate_common::{Credential, HashAlgorithm};
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::config::HasherSettings;
use crate::error::{AuthError, AuthResult};

/// Slow, salted key derivation over passwords.
///
/// `hash(password, salt)` is deterministic for a given algorithm and parameter
/// set; distinct salts give distinct digests.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    settings: HasherSettings,
}

impl CredentialHasher {
    /// Create a hasher, rejecting parameters the KDFs would refuse
    pub fn new(settings: HasherSettings) -> AuthResult<Self> {
        settings
            .validate()
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(Self { settings })
    }

    /// Algorithm used for newly created credentials
    pub fn algorithm(&self) -> HashAlgorithm {
        self.settings.algorithm
    }

    /// Fresh salt from the thread-local CSPRNG
    pub fn generate_salt(&self) -> Vec<u8> {
        let mut salt = vec![0u8; self.settings.salt_len];
        rand::rng().fill_bytes(&mut salt);
        salt
    }

    /// Hash with the configured algorithm and return the base64 digest
    pub fn hash(&self, password: &str, salt: &[u8]) -> AuthResult<String> {
        let digest = self.derive(self.settings.algorithm, password, salt, self.settings.output_len)?;
        Ok(STANDARD_NO_PAD.encode(digest.as_slice()))
    }

    /// Build a new credential with a fresh salt
    pub fn new_credential(&self, password: &str, now: DateTime<Utc>) -> AuthResult<Credential> {
        let salt = self.generate_salt();
        let hash = self.hash(password, &salt)?;
        Ok(Credential {
            algorithm: self.settings.algorithm,
            hash,
            salt: STANDARD_NO_PAD.encode(salt),
            created_at: now,
        })
    }

    /// Recompute the digest with the credential's own salt and algorithm and
    /// compare in constant time
    pub fn verify(&self, password: &str, credential: &Credential) -> AuthResult<bool> {
        let salt = decode(&credential.salt)?;
        let expected = Zeroizing::new(decode(&credential.hash)?);
        let computed = self.derive(credential.algorithm, password, &salt, expected.len())?;
        Ok(bool::from(computed.as_slice().ct_eq(expected.as_slice())))
    }

    fn derive(
        &self,
        algorithm: HashAlgorithm,
        password: &str,
        salt: &[u8],
        output_len: usize,
    ) -> AuthResult<Zeroizing<Vec<u8>>> {
        let mut out = Zeroizing::new(vec![0u8; output_len]);
        match algorithm {
            HashAlgorithm::Argon2id => {
                let params = Params::new(
                    self.settings.memory_kib,
                    self.settings.iterations,
                    self.settings.parallelism,
                    Some(output_len),
                )
                .map_err(|e| AuthError::Internal(format!("argon2 parameters: {e}")))?;
                Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                    .hash_password_into(password.as_bytes(), salt, &mut out)
                    .map_err(|e| AuthError::Internal(format!("argon2: {e}")))?;
            }
            HashAlgorithm::Scrypt => {
                let params = scrypt::Params::new(
                    self.settings.scrypt_log_n,
                    self.settings.scrypt_r,
                    self.settings.scrypt_p,
                    output_len,
                )
                .map_err(|e| AuthError::Internal(format!("scrypt parameters: {e}")))?;
                scrypt::scrypt(password.as_bytes(), salt, &params, &mut out)
                    .map_err(|e| AuthError::Internal(format!("scrypt: {e}")))?;
            }
        }
        Ok(out)
    }
}

fn decode(encoded: &str) -> AuthResult<Vec<u8>> {
    STANDARD_NO_PAD
        .decode(encoded)
        .map_err(|_| AuthError::Internal("stored credential is not valid base64".to_string()))
}
