//! Custodial Ed25519 signer.

use ed25519_dalek::{Signer as _, SigningKey};

use payments_types::{InstructionSigner, SettlementInstruction, SignedInstruction, SignerError};

/// Process-wide custodial key. Signing is a pure read of the key.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Loads a base58 secret: either a 32-byte seed or a 64-byte
    /// `seed || public key` keypair.
    pub fn from_base58(secret: &str) -> Result<Self, SignerError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;

        let key = match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            64 => {
                let mut keypair = [0u8; 64];
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| SignerError::InvalidKey(e.to_string()))?
            }
            n => {
                return Err(SignerError::InvalidKey(format!(
                    "expected 32 or 64 bytes, got {}",
                    n
                )));
            }
        };

        Ok(Self { key })
    }
}

impl InstructionSigner for Ed25519Signer {
    fn identity(&self) -> String {
        bs58::encode(self.key.verifying_key().as_bytes()).into_string()
    }

    fn sign(&self, instruction: &SettlementInstruction) -> Result<SignedInstruction, SignerError> {
        if instruction.payload.is_empty() {
            return Err(SignerError::MalformedInstruction(
                "instruction payload is empty".into(),
            ));
        }
        let signature = self.key.sign(&instruction.payload);

        Ok(SignedInstruction {
            payload: instruction.payload.clone(),
            signature: signature.to_bytes().to_vec(),
            signer: self.identity(),
        })
    }
}
