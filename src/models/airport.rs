use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::SortKey;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use validator::Validate;

#[derive(Debug, sqlx::FromRow)]
pub struct AirportRecord {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub city: String,
    pub country: String,
    pub continent: String,
    pub city_photo_url: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Airport {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub city: String,
    pub country: String,
    pub continent: String,
    pub city_photo_url: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AirportRecord> for Airport {
    type Error = AppError;

    fn try_from(record: AirportRecord) -> AppResult<Self> {
        Ok(Airport {
            id: record.id,
            name: record.name,
            code: record.code,
            city: record.city,
            country: record.country,
            continent: record.continent,
            city_photo_url: record.city_photo_url,
            created_at: timestamp(record.created_at)?,
        })
    }
}

pub(crate) fn timestamp(seconds: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| AppError::DatabaseError(format!("invalid stored timestamp {}", seconds)))
}

#[derive(Debug, Clone, Deserialize, JsonSchema, Validate)]
pub struct AirportRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    // IATA code
    #[validate(length(min = 3, max = 4))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[validate(length(min = 1, max = 50))]
    pub continent: String,
    #[serde(default)]
    pub city_photo_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum AirportSortKey {
    Name,
    Code,
    City,
    Country,
    Continent,
    #[strum(serialize = "created_at", serialize = "createdat")]
    CreatedAt,
}

impl SortKey for AirportSortKey {
    fn column(&self) -> &'static str {
        match self {
            AirportSortKey::Name => "name",
            AirportSortKey::Code => "code",
            AirportSortKey::City => "city",
            AirportSortKey::Country => "country",
            AirportSortKey::Continent => "continent",
            AirportSortKey::CreatedAt => "created_at",
        }
    }
}
