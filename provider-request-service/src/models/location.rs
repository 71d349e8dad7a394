//! Locations a requesting provider operates in.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A location attached to a provider request.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Location {
    pub location_id: Uuid,
    pub request_id: Uuid,
    pub name: String,
    pub city: String,
    pub country: String,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.name, self.country, self.city)
    }
}

/// Input for attaching a location.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewLocation {
    #[serde(default)]
    #[validate(length(max = 255, message = "Location name is too long"))]
    pub name: String,

    #[validate(length(min = 1, max = 255, message = "City is required"))]
    pub city: String,

    /// ISO 3166-1 alpha-2 code.
    #[validate(length(equal = 2, message = "Country must be a two-letter code"))]
    pub country: String,
}

impl NewLocation {
    pub fn new(name: impl Into<String>, city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            city: city.into(),
            country: country.into().to_ascii_uppercase(),
        }
    }
}
