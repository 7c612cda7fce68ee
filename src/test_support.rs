// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token signing and JWKS fixtures shared by unit tests.
//!
//! Ed25519 signers derive their key from `[seed; 32]`, the same scheme the
//! integration tests use. The RSA signer always uses the fixed key in
//! `tests/fixtures/rsa_signing_key.pem`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, Ed25519KeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{AuthConfig, JWKS_WELL_KNOWN_PATH};

pub const TEST_ISSUER: &str = "https://clerk.thimar.test";

/// PKCS#1 RSA-2048 private key used for RS256/PS256 test tokens.
pub const RSA_SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/rsa_signing_key.pem");

/// Base64url modulus of [`RSA_SIGNING_KEY_PEM`]. The exponent is 65537.
pub const RSA_MODULUS: &str = "p-sH-Kh26PCDSDHSMZ2LJBAztdJtui7HrQcQrG0SQDAOh4KPflh9cNRKHkdoDPWtJP21aQvJWiX-2TMeZDthCjqtt9EQeGX9sD-xqJQPmxCD3UPNHp6WLl676KgrzUFn4B9XAtHujm5dZhLgLR2dwvOQRMorRr9yhmcgIfeVTy46Zi1L5J6ZURyxUDjYC8R3BMVJ4WPAXEv6udqxkNK7lSpv1D8I04yWPPVr_RoLXI_V_jqm67kVag2Hl7TmIuYucCI7jwP7TIxT29dAwL9H5oUIEI9fsjRAxVOAKYrzWK4xFkCESx94CJ6Q6l3YdN2D0XGmXACWztwARCaRgNrrcQ";

enum SignerKey {
    Ed25519 { public_key: Vec<u8>, pkcs8: Vec<u8> },
    P256 { public_key: Vec<u8>, pkcs8: Vec<u8> },
    Rsa,
}

/// Key pair that signs test tokens and publishes its JWK.
pub struct TestSigner {
    pub kid: String,
    key: SignerKey,
}

impl TestSigner {
    /// Ed25519 signer derived from `[seed; 32]`.
    pub fn new(seed: u8, kid: &str) -> Self {
        let seed_bytes = [seed; 32];
        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes).unwrap();
        Self {
            kid: kid.to_string(),
            key: SignerKey::Ed25519 {
                public_key: key_pair.public_key().as_ref().to_vec(),
                pkcs8: pkcs8_from_seed(&seed_bytes),
            },
        }
    }

    /// RS256 signer over the fixed RSA test key.
    pub fn rsa(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            key: SignerKey::Rsa,
        }
    }

    /// ES256 signer with a freshly generated P-256 key.
    pub fn p256(kid: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng).unwrap();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .unwrap();
        Self {
            kid: kid.to_string(),
            key: SignerKey::P256 {
                public_key: key_pair.public_key().as_ref().to_vec(),
                pkcs8: pkcs8.as_ref().to_vec(),
            },
        }
    }

    /// Algorithm this signer uses by default.
    pub fn algorithm(&self) -> Algorithm {
        match self.key {
            SignerKey::Ed25519 { .. } => Algorithm::EdDSA,
            SignerKey::P256 { .. } => Algorithm::ES256,
            SignerKey::Rsa => Algorithm::RS256,
        }
    }

    pub fn jwk(&self) -> Value {
        match &self.key {
            SignerKey::Ed25519 { public_key, .. } => json!({
                "kty": "OKP",
                "kid": self.kid,
                "crv": "Ed25519",
                "x": URL_SAFE_NO_PAD.encode(public_key),
                "alg": "EdDSA",
                "use": "sig"
            }),
            // Uncompressed point: 0x04 || x || y
            SignerKey::P256 { public_key, .. } => json!({
                "kty": "EC",
                "kid": self.kid,
                "crv": "P-256",
                "x": URL_SAFE_NO_PAD.encode(&public_key[1..33]),
                "y": URL_SAFE_NO_PAD.encode(&public_key[33..65]),
                "alg": "ES256",
                "use": "sig"
            }),
            SignerKey::Rsa => json!({
                "kty": "RSA",
                "kid": self.kid,
                "n": RSA_MODULUS,
                "e": "AQAB",
                "alg": "RS256",
                "use": "sig"
            }),
        }
    }

    pub fn sign(&self, claims: &Value) -> String {
        self.sign_as(self.algorithm(), claims)
    }

    /// Sign with this signer's key under another algorithm of the same family.
    pub fn sign_as(&self, alg: Algorithm, claims: &Value) -> String {
        let key = match &self.key {
            SignerKey::Ed25519 { pkcs8, .. } => EncodingKey::from_ed_der(pkcs8),
            SignerKey::P256 { pkcs8, .. } => EncodingKey::from_ec_der(pkcs8),
            SignerKey::Rsa => EncodingKey::from_rsa_pem(RSA_SIGNING_KEY_PEM.as_bytes()).unwrap(),
        };
        let mut header = Header::new(alg);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &key).unwrap()
    }

    /// HS256 token keyed with this signer's public key bytes, carrying its kid.
    pub fn sign_hmac_with_public_key(&self, claims: &Value) -> String {
        let secret = match &self.key {
            SignerKey::Ed25519 { public_key, .. } | SignerKey::P256 { public_key, .. } => {
                public_key.clone()
            }
            SignerKey::Rsa => URL_SAFE_NO_PAD.decode(RSA_MODULUS).unwrap(),
        };
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &EncodingKey::from_secret(&secret)).unwrap()
    }
}

/// PKCS#8 v1 document wrapping an Ed25519 seed.
fn pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = vec![0x30, 0x2e, 0x02, 0x01, 0x00];
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);
    pkcs8
}

pub fn jwks_document(signers: &[&TestSigner]) -> Value {
    json!({ "keys": signers.iter().map(|s| s.jwk()).collect::<Vec<_>>() })
}

/// Start a mock provider that serves the given signers' keys.
pub async fn jwks_server(signers: &[&TestSigner]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_WELL_KNOWN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(signers)))
        .mount(&server)
        .await;
    server
}

pub fn auth_config(server: &MockServer) -> AuthConfig {
    AuthConfig::new(server.uri(), TEST_ISSUER)
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Claims for `sub` issued by [`TEST_ISSUER`], expiring `exp_in` seconds from now.
pub fn claims(sub: &str, exp_in: i64) -> Value {
    json!({
        "sub": sub,
        "iss": TEST_ISSUER,
        "iat": now(),
        "exp": now() + exp_in,
    })
}
