// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Location hints carried alongside authenticated requests.
//!
//! Sources, highest priority first:
//!
//! 1. `X-User-Latitude` / `X-User-Longitude` headers
//! 2. `latitude` / `longitude` query parameters
//! 3. `latitude` / `longitude` fields of a JSON or form-encoded body
//!
//! The first source that carries either coordinate wins, even if it turns
//! out to be incomplete or unparseable. Lower-priority sources are not
//! consulted in that case.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

pub const LATITUDE_HEADER: &str = "x-user-latitude";
pub const LONGITUDE_HEADER: &str = "x-user-longitude";
pub const LATITUDE_FIELD: &str = "latitude";
pub const LONGITUDE_FIELD: &str = "longitude";

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationHint {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationHint {
    /// Build a hint, rejecting non-finite or out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// Coordinates as found in one source, before parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLocation {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl RawLocation {
    fn from_pair(latitude: Option<String>, longitude: Option<String>) -> Option<Self> {
        let latitude = latitude.filter(|v| !v.trim().is_empty());
        let longitude = longitude.filter(|v| !v.trim().is_empty());
        if latitude.is_none() && longitude.is_none() {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }

    /// Parse into a hint. Incomplete or invalid coordinates yield `None`.
    pub fn into_hint(self) -> Option<LocationHint> {
        let (Some(lat), Some(lon)) = (self.latitude, self.longitude) else {
            tracing::debug!("Location hint has only one coordinate, ignoring");
            return None;
        };
        let parsed = lat
            .trim()
            .parse::<f64>()
            .ok()
            .zip(lon.trim().parse::<f64>().ok())
            .and_then(|(lat, lon)| LocationHint::new(lat, lon));
        if parsed.is_none() {
            tracing::warn!(latitude = %lat, longitude = %lon, "Ignoring invalid location hint");
        }
        parsed
    }
}

/// Read coordinates from the `X-User-*` headers.
pub fn from_headers(headers: &HeaderMap) -> Option<RawLocation> {
    let value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    RawLocation::from_pair(value(LATITUDE_HEADER), value(LONGITUDE_HEADER))
}

/// Read coordinates from a URL query string.
pub fn from_query(query: Option<&str>) -> Option<RawLocation> {
    from_form_pairs(query?.as_bytes())
}

enum BodyKind {
    Json,
    Form,
}

fn body_kind(content_type: Option<&str>) -> Option<BodyKind> {
    let mime = content_type?.split(';').next()?.trim();
    if mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json") {
        Some(BodyKind::Json)
    } else if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        Some(BodyKind::Form)
    } else {
        None
    }
}

/// Whether a body of this content type can carry coordinates.
pub fn is_supported_body(content_type: Option<&str>) -> bool {
    body_kind(content_type).is_some()
}

/// Read coordinates from a request body, given its content type.
///
/// JSON objects and `application/x-www-form-urlencoded` bodies are supported;
/// anything else yields `None`.
pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Option<RawLocation> {
    match body_kind(content_type)? {
        BodyKind::Json => from_json(body),
        BodyKind::Form => from_form_pairs(body),
    }
}

fn from_form_pairs(input: &[u8]) -> Option<RawLocation> {
    let mut latitude = None;
    let mut longitude = None;
    for (key, value) in url::form_urlencoded::parse(input) {
        match key.as_ref() {
            LATITUDE_FIELD if latitude.is_none() => latitude = Some(value.into_owned()),
            LONGITUDE_FIELD if longitude.is_none() => longitude = Some(value.into_owned()),
            _ => {}
        }
    }
    RawLocation::from_pair(latitude, longitude)
}

fn from_json(body: &[u8]) -> Option<RawLocation> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;
    let field = |name: &str| match object.get(name)? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s.clone()),
        _ => None,
    };
    RawLocation::from_pair(field(LATITUDE_FIELD), field(LONGITUDE_FIELD))
}
