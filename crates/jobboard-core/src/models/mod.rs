//! Data models for job board resources.
//!
//! - `JobOffer`: a posted position
//! - `Application`, `ApplicationStatus`, `NewApplication`: candidate applications

pub mod application;
pub mod offer;

pub use application::{Application, ApplicationStatus, NewApplication};
pub use offer::JobOffer;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

/// Accept either a plain date or a full timestamp and keep the date part.
pub(crate) fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let date_part = s.get(..10).unwrap_or(&s);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }))
}
