//! Private key material used to sign client assertions.

// std
use std::{fs, path::Path};
// crates.io
use jsonwebtoken::{Algorithm, EncodingKey};
// self
use crate::{_prelude::*, error::ConfigError};

/// JWS algorithm used for the client assertion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
	/// RSASSA-PKCS1-v1_5 with SHA-256.
	#[default]
	#[serde(rename = "RS256")]
	Rs256,
	/// ECDSA over P-256 with SHA-256.
	#[serde(rename = "ES256")]
	Es256,
}
impl SigningAlgorithm {
	/// Returns the JOSE `alg` name.
	pub const fn as_str(self) -> &'static str {
		match self {
			SigningAlgorithm::Rs256 => "RS256",
			SigningAlgorithm::Es256 => "ES256",
		}
	}

	pub(crate) const fn jwt_algorithm(self) -> Algorithm {
		match self {
			SigningAlgorithm::Rs256 => Algorithm::RS256,
			SigningAlgorithm::Es256 => Algorithm::ES256,
		}
	}
}
impl Display for SigningAlgorithm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Signing key for the private-key JWT client assertion.
///
/// PEM input accepts PKCS#1 RSA keys (`RSA PRIVATE KEY`) and PKCS#8 RSA or P-256 keys
/// (`PRIVATE KEY`); the algorithm is inferred from the key type. DER input is PKCS#1 for RSA
/// and PKCS#8 for P-256, with the algorithm supplied by the caller.
#[derive(Clone)]
pub struct PrivateKey {
	encoding_key: EncodingKey,
	algorithm: SigningAlgorithm,
}
impl PrivateKey {
	const PEM_PREFIX: &'static str = "-----BEGIN";

	/// Parses PEM content.
	pub fn pem(content: impl AsRef<str>) -> Result<Self, ConfigError> {
		let content = content.as_ref().trim();

		if !content.starts_with(Self::PEM_PREFIX) {
			return Err(ConfigError::InvalidPrivateKey { reason: "expected PEM content".into() });
		}
		if content.contains("BEGIN EC PRIVATE KEY") {
			return Err(ConfigError::InvalidPrivateKey {
				reason: "SEC1 EC keys must be converted to PKCS#8".into(),
			});
		}
		if let Ok(encoding_key) = EncodingKey::from_rsa_pem(content.as_bytes()) {
			return Ok(Self { encoding_key, algorithm: SigningAlgorithm::Rs256 });
		}

		EncodingKey::from_ec_pem(content.as_bytes())
			.map(|encoding_key| Self { encoding_key, algorithm: SigningAlgorithm::Es256 })
			.map_err(|_| ConfigError::InvalidPrivateKey {
				reason: "unsupported PEM key; expected an RSA or P-256 private key".into(),
			})
	}

	/// Wraps DER bytes for the given algorithm.
	pub fn der(bytes: impl AsRef<[u8]>, algorithm: SigningAlgorithm) -> Self {
		let encoding_key = match algorithm {
			SigningAlgorithm::Rs256 => EncodingKey::from_rsa_der(bytes.as_ref()),
			SigningAlgorithm::Es256 => EncodingKey::from_ec_der(bytes.as_ref()),
		};

		Self { encoding_key, algorithm }
	}

	/// Reads and parses a PEM file.
	pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = fs::read_to_string(path).map_err(ConfigError::PrivateKeyFile)?;

		Self::pem(content)
	}

	/// Algorithm the key signs with.
	pub fn algorithm(&self) -> SigningAlgorithm {
		self.algorithm
	}

	pub(crate) fn encoding_key(&self) -> &EncodingKey {
		&self.encoding_key
	}
}
impl Debug for PrivateKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PrivateKey")
			.field("algorithm", &self.algorithm)
			.field("material", &"<redacted>")
			.finish()
	}
}
