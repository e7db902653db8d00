//! Typed calls for the job board resources.

use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::models::{Application, JobOffer, NewApplication};

use super::{ApiClient, ApiError};

pub const OFFERS_PATH: &str = "/candidates/offers/";
pub const APPLICATIONS_PATH: &str = "/candidates/applications/";

/// Form field carrying the uploaded CV
const CV_FIELD: &str = "cv_file";

impl ApiClient {
    /// Fetch all open job offers
    pub async fn list_offers(&self) -> Result<Vec<JobOffer>, ApiError> {
        let offers: Vec<JobOffer> = self.get(OFFERS_PATH).await?;
        debug!(count = offers.len(), "Offers fetched");
        Ok(offers)
    }

    /// Fetch a single job offer
    pub async fn fetch_offer(&self, id: i64) -> Result<JobOffer, ApiError> {
        self.get(&format!("{}{}/", OFFERS_PATH, id)).await
    }

    /// Fetch the applications visible to the current user
    pub async fn list_applications(&self) -> Result<Vec<Application>, ApiError> {
        let applications: Vec<Application> = self.get(APPLICATIONS_PATH).await?;
        debug!(count = applications.len(), "Applications fetched");
        Ok(applications)
    }

    /// Submit an application with its CV as a multipart upload
    pub async fn submit_application(
        &self,
        application: &NewApplication,
    ) -> Result<Application, ApiError> {
        let bytes = tokio::fs::read(&application.cv_path).await.map_err(|e| {
            ApiError::InvalidRequest(format!(
                "could not read CV {}: {}",
                application.cv_path.display(),
                e
            ))
        })?;

        let file_name = application
            .cv_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cv.pdf".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(&application.cv_path))
            .map_err(ApiError::from_transport)?;

        let form = Form::new()
            .text("job", application.job.to_string())
            .text("candidate", application.candidate.to_string())
            .text("cover_letter", application.cover_letter.clone())
            .part(CV_FIELD, part);

        self.post_multipart(APPLICATIONS_PATH, form).await
    }
}

fn mime_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
