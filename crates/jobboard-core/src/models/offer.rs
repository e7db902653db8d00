use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::lenient_date;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOffer {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "postedDate", deserialize_with = "lenient_date")]
    pub posted_date: Option<NaiveDate>,
}

impl JobOffer {
    pub fn company_display(&self) -> &str {
        self.company.as_deref().unwrap_or("-")
    }

    pub fn location_display(&self) -> &str {
        self.location.as_deref().unwrap_or("-")
    }

    /// Posting date as YYYY-MM-DD, or "-" when unknown
    pub fn posted_display(&self) -> String {
        self.posted_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}
