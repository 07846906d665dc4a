//! Ed25519 identity keys and registration signatures.
//!
//! Agents prove control of their public key by signing the canonical
//! registration message returned by [`registration_message`].

use std::fmt;

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{Address, CoreError};

/// Returns the canonical message an agent signs to register.
#[must_use]
pub fn registration_message(agent_id: &str) -> String {
    format!("Register Agent: {agent_id}")
}

/// An Ed25519 keypair held by an agent or the platform.
#[derive(Debug)]
pub struct Keypair {
    signing_key: SigningKey,
}

/// A public key used to verify agent signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

/// An Ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(DalekSignature);

impl Keypair {
    /// Generates a new keypair from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Creates a keypair from raw secret key bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Returns the public half of this keypair.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }

    /// Returns the ledger address derived from the public key.
    #[must_use]
    pub fn address(&self) -> Address {
        self.public_key().address()
    }

    /// Signs a message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message))
    }

    /// Signs the canonical registration message for `agent_id`.
    #[must_use]
    pub fn sign_registration(&self, agent_id: &str) -> Signature {
        self.sign(registration_message(agent_id).as_bytes())
    }
}

impl Default for Keypair {
    fn default() -> Self {
        Self::generate()
    }
}

impl PublicKey {
    /// Returns the raw bytes of the public key.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Creates a public key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Crypto` if the bytes are not a valid curve point.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CoreError> {
        VerifyingKey::from_bytes(bytes)
            .map(PublicKey)
            .map_err(|e| CoreError::Crypto(e.to_string()))
    }

    /// Parses a hex-encoded public key.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Crypto` on bad hex, wrong length, or invalid point.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::Crypto(format!("invalid hex: {e}")))?;
        let array: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CoreError::Crypto(format!("public key must be 32 bytes, got {}", bytes.len()))
        })?;
        Self::from_bytes(&array)
    }

    /// Returns the hex encoding of the key.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Returns the base58 ledger address for this key.
    #[must_use]
    pub fn address(&self) -> Address {
        Address::from_public_key(self.as_bytes())
    }

    /// Verifies a signature over `message`.
    ///
    /// Uses strict verification so malleated signatures are rejected.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSignature` if verification fails.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CoreError> {
        self.0
            .verify_strict(message, &signature.0)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Signature {
    /// Returns the raw bytes of the signature.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    /// Creates a signature from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self(DalekSignature::from_bytes(bytes))
    }

    /// Parses a hex-encoded signature.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Crypto` on bad hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::Crypto(format!("invalid hex: {e}")))?;
        let array: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            CoreError::Crypto(format!("signature must be 64 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(&array))
    }

    /// Returns the hex encoding of the signature.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}
