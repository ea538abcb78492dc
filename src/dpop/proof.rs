// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
	Algorithm, EncodingKey, Header,
	jwk::{
		AlgorithmParameters, CommonParameters, EllipticCurve, EllipticCurveKeyParameters,
		EllipticCurveKeyType, Jwk,
	},
};
use ring::{
	rand::SystemRandom,
	signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair},
};
use sha2::{Digest, Sha256};
use uuid::Uuid;
// self
use crate::{_prelude::*, error::ConfigError};

/// `typ` header of every proof.
pub const PROOF_TYPE: &str = "dpop+jwt";

/// ES256 key pair that signs DPoP proofs; created once per client and never rotated.
#[derive(Clone)]
pub struct ProofKey {
	encoding_key: EncodingKey,
	jwk: Jwk,
}
impl ProofKey {
	/// Generates a fresh P-256 key pair.
	pub fn generate() -> Result<Self, ConfigError> {
		let rng = SystemRandom::new();
		let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
			.map_err(|_| ConfigError::ProofKey)?;
		let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
			.map_err(|_| ConfigError::ProofKey)?;
		// Uncompressed SEC1 point: 0x04 || x || y.
		let point = pair.public_key().as_ref();

		if point.len() != 65 {
			return Err(ConfigError::ProofKey);
		}

		let jwk = Jwk {
			common: CommonParameters::default(),
			algorithm: AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
				key_type: EllipticCurveKeyType::EC,
				curve: EllipticCurve::P256,
				x: URL_SAFE_NO_PAD.encode(&point[1..33]),
				y: URL_SAFE_NO_PAD.encode(&point[33..65]),
			}),
		};

		Ok(Self { encoding_key: EncodingKey::from_ec_der(pkcs8.as_ref()), jwk })
	}

	/// Public half embedded in every proof header.
	pub fn public_jwk(&self) -> &Jwk {
		&self.jwk
	}

	/// Signs `claims` into a compact proof JWT.
	pub fn sign(&self, claims: &ProofClaims) -> Result<String, ConfigError> {
		let mut header = Header::new(Algorithm::ES256);

		header.typ = Some(PROOF_TYPE.into());
		header.jwk = Some(self.jwk.clone());

		Ok(jsonwebtoken::encode(&header, claims, &self.encoding_key)?)
	}
}
impl Debug for ProofKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProofKey").field("jwk", &self.jwk).finish_non_exhaustive()
	}
}

/// Claims of one DPoP proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofClaims {
	/// HTTP method.
	pub htm: String,
	/// Canonical target URI, see [`canonical_htu`].
	pub htu: String,
	/// Unique proof identifier.
	pub jti: String,
	/// Issued-at, seconds since the epoch.
	pub iat: i64,
	/// Access token hash for requests that present a token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ath: Option<String>,
	/// Server nonce for token requests.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
}
impl ProofClaims {
	/// Claims for `method` + `url` with a fresh `jti`.
	pub fn new(method: &Method, url: &Url, now: OffsetDateTime) -> Self {
		Self {
			htm: method.as_str().to_owned(),
			htu: canonical_htu(url),
			jti: Uuid::new_v4().to_string(),
			iat: now.unix_timestamp(),
			ath: None,
			nonce: None,
		}
	}
}

/// Request URI without query or fragment, percent-decoded (`+` as space), then with `%`,
/// space, `"` and `#` re-encoded.
pub fn canonical_htu(url: &Url) -> String {
	let mut base = url.clone();

	base.set_query(None);
	base.set_fragment(None);

	let plus_decoded = base.as_str().replace('+', " ");
	let decoded = urlencoding::decode(&plus_decoded)
		.map(|value| value.into_owned())
		.unwrap_or(plus_decoded);

	decoded.replace('%', "%25").replace(' ', "%20").replace('"', "%22").replace('#', "%23")
}

/// `ath` claim: base64url SHA-256 of the access token.
pub fn access_token_hash(token: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}
