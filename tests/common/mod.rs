// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mock Clerk provider and token signing for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};
use thimar_identity::{
    api::router,
    config::{AuthConfig, JWKS_WELL_KNOWN_PATH},
    state::AppState,
    storage::PrincipalRepository,
};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ISSUER: &str = "https://clerk.thimar.test";

/// Fixed RSA test key, shared with the unit-test fixtures.
const RSA_SIGNING_KEY_PEM: &str = include_str!("../fixtures/rsa_signing_key.pem");
const RSA_MODULUS: &str = "p-sH-Kh26PCDSDHSMZ2LJBAztdJtui7HrQcQrG0SQDAOh4KPflh9cNRKHkdoDPWtJP21aQvJWiX-2TMeZDthCjqtt9EQeGX9sD-xqJQPmxCD3UPNHp6WLl676KgrzUFn4B9XAtHujm5dZhLgLR2dwvOQRMorRr9yhmcgIfeVTy46Zi1L5J6ZURyxUDjYC8R3BMVJ4WPAXEv6udqxkNK7lSpv1D8I04yWPPVr_RoLXI_V_jqm67kVag2Hl7TmIuYucCI7jwP7TIxT29dAwL9H5oUIEI9fsjRAxVOAKYrzWK4xFkCESx94CJ6Q6l3YdN2D0XGmXACWztwARCaRgNrrcQ";

enum Key {
    /// Ed25519 key derived from `[seed; 32]`
    Ed25519 { public_key: Vec<u8>, pkcs8: Vec<u8> },
    Rsa,
}

pub struct Signer {
    pub kid: String,
    key: Key,
}

impl Signer {
    pub fn new(seed: u8, kid: &str) -> Self {
        let seed_bytes = [seed; 32];
        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes).unwrap();

        // PKCS#8 v1 wrapping of the raw seed
        let mut pkcs8 = vec![
            0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22,
            0x04, 0x20,
        ];
        pkcs8.extend_from_slice(&seed_bytes);

        Self {
            kid: kid.to_string(),
            key: Key::Ed25519 {
                public_key: key_pair.public_key().as_ref().to_vec(),
                pkcs8,
            },
        }
    }

    /// RS256 signer, the algorithm Clerk issues session tokens with.
    pub fn rsa(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            key: Key::Rsa,
        }
    }

    pub fn jwk(&self) -> Value {
        match &self.key {
            Key::Ed25519 { public_key, .. } => json!({
                "kty": "OKP",
                "crv": "Ed25519",
                "kid": self.kid,
                "x": URL_SAFE_NO_PAD.encode(public_key),
                "use": "sig"
            }),
            Key::Rsa => json!({
                "kty": "RSA",
                "kid": self.kid,
                "n": RSA_MODULUS,
                "e": "AQAB",
                "alg": "RS256",
                "use": "sig"
            }),
        }
    }

    pub fn token(&self, sub: &str, email: Option<&str>, exp_in: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let mut claims = json!({
            "sub": sub,
            "iss": ISSUER,
            "iat": now,
            "nbf": now - 5,
            "exp": now + exp_in,
        });
        if let Some(email) = email {
            claims["email"] = json!(email);
        }
        let (alg, key) = match &self.key {
            Key::Ed25519 { pkcs8, .. } => (Algorithm::EdDSA, EncodingKey::from_ed_der(pkcs8)),
            Key::Rsa => (
                Algorithm::RS256,
                EncodingKey::from_rsa_pem(RSA_SIGNING_KEY_PEM.as_bytes()).unwrap(),
            ),
        };
        let mut header = Header::new(alg);
        header.kid = Some(self.kid.clone());
        encode(&header, &claims, &key).unwrap()
    }
}

pub fn jwks(signers: &[&Signer]) -> Value {
    json!({ "keys": signers.iter().map(|s| s.jwk()).collect::<Vec<_>>() })
}

pub async fn provider(signers: &[&Signer]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_WELL_KNOWN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(signers)))
        .mount(&server)
        .await;
    server
}

pub fn app(server: &MockServer, principals: Arc<dyn PrincipalRepository>) -> Router {
    router(AppState::new(
        &AuthConfig::new(server.uri(), ISSUER),
        principals,
    ))
}

pub async fn get_me(app: &Router, token: Option<&str>, extra: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri("/api/users/me");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    for (name, value) in extra {
        builder = builder.header(*name, *value);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
