use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::lenient_date;

/// Where an application stands in the recruiter's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Interviewing,
    Accepted,
    Rejected,
    Other,
}

impl ApplicationStatus {
    /// Parse a status label case-insensitively
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pending" | "submitted" => ApplicationStatus::Pending,
            "interviewing" | "interview" => ApplicationStatus::Interviewing,
            "accepted" | "hired" => ApplicationStatus::Accepted,
            "rejected" | "declined" => ApplicationStatus::Rejected,
            _ => ApplicationStatus::Other,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Interviewing => "Interviewing",
            ApplicationStatus::Accepted => "Accepted",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Other => "Other",
        }
    }
}

impl From<String> for ApplicationStatus {
    fn from(s: String) -> Self {
        Self::from_label(&s)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    #[serde(default)]
    pub job: Option<i64>,
    #[serde(default, alias = "jobTitle")]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default, alias = "appliedDate", deserialize_with = "lenient_date")]
    pub applied_date: Option<NaiveDate>,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

impl Application {
    pub fn title_display(&self) -> String {
        match (&self.job_title, self.job) {
            (Some(title), _) => title.clone(),
            (None, Some(job)) => format!("Job #{}", job),
            (None, None) => "-".to_string(),
        }
    }
}

/// Fields submitted with a new application. The CV is uploaded from `cv_path`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub job: i64,
    pub candidate: i64,
    pub cover_letter: String,
    pub cv_path: PathBuf,
}
