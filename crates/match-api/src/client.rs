//! Authenticated client for the Resume Match Pro backend
//!
//! Every call first obtains a bearer token for the API scopes from the
//! shared `TokenCoordinator`, so concurrent calls for the same account
//! reuse one cached token or one in-flight acquisition.

use std::sync::Arc;

use identity::{Account, ScopeSet};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use token_broker::TokenCoordinator;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{
    FileType, FilesEnvelope, LimitsUpdate, MatchResult, ResultsEnvelope, RmpFile, UploadFile,
    UserDetails,
};

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    coordinator: Arc<TokenCoordinator>,
    scopes: ScopeSet,
}

impl ApiClient {
    /// Client for the backend rooted at `base_url` (e.g. `https://host/api`).
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        coordinator: Arc<TokenCoordinator>,
        scopes: ScopeSet,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            http,
            base_url,
            coordinator,
            scopes,
        }
    }

    /// Client using the configured backend URL and API scopes.
    pub fn from_config(coordinator: Arc<TokenCoordinator>, config: &common::Config) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::new(
            http,
            config.backend_url(),
            coordinator,
            ScopeSet::new(config.api_scopes()),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Files owned by `account`, optionally only one kind.
    pub async fn list_files(
        &self,
        account: &Account,
        file_type: Option<FileType>,
    ) -> Result<Vec<RmpFile>> {
        let type_param = file_type.map(|t| t.as_str()).unwrap_or_default();
        let response = self
            .request(account, Method::GET, &["files"])
            .await?
            .query(&[
                ("user_id", account.local_account_id.as_str()),
                ("type", type_param),
            ])
            .send()
            .await?;
        let envelope: FilesEnvelope = decode(response, "file list").await?;
        Ok(envelope.files)
    }

    /// Upload documents of one kind; returns the stored file records.
    pub async fn upload_files(
        &self,
        account: &Account,
        files: Vec<UploadFile>,
        file_type: FileType,
    ) -> Result<Vec<RmpFile>> {
        let count = files.len();
        let mut form = Form::new();
        for file in files {
            form = form.part("content", Part::bytes(file.bytes).file_name(file.name));
        }
        form = form
            .text("user_id", account.local_account_id.clone())
            .text("type", file_type.as_str());

        // multipart sets its own boundary content type
        let mut headers = self
            .coordinator
            .auth_headers(account, &self.scopes)
            .await?;
        headers.remove(CONTENT_TYPE);

        let response = self
            .http
            .post(self.url(&["files", "upload"])?)
            .headers(headers)
            .multipart(form)
            .send()
            .await?;
        let envelope: FilesEnvelope = decode(response, "upload result").await?;
        info!(
            account = %account.home_account_id,
            file_type = %file_type,
            count,
            stored = envelope.files.len(),
            "files uploaded"
        );
        Ok(envelope.files)
    }

    pub async fn delete_file(&self, account: &Account, file_id: &str) -> Result<()> {
        let response = self
            .request(account, Method::DELETE, &["files", file_id])
            .await?
            .send()
            .await?;
        check(response).await?;
        info!(account = %account.home_account_id, file_id, "file deleted");
        Ok(())
    }

    /// Match results for one CV or job description.
    pub async fn matching_results(
        &self,
        account: &Account,
        file_id: &str,
        file_type: FileType,
    ) -> Result<Vec<MatchResult>> {
        let response = self
            .request(account, Method::GET, &["results"])
            .await?
            .query(&[
                ("user_id", account.local_account_id.as_str()),
                ("file_id", file_id),
                ("file_type", file_type.as_str()),
            ])
            .send()
            .await?;
        let envelope: ResultsEnvelope = decode(response, "matching results").await?;
        Ok(envelope.results)
    }

    /// Look up a user by email or name (admin only).
    pub async fn search_user(&self, account: &Account, query: &str) -> Result<UserDetails> {
        let response = self
            .request(account, Method::GET, &["users", "search"])
            .await?
            .query(&[("q", query)])
            .send()
            .await?;
        decode(response, "user details").await
    }

    /// Change a user's upload and matching quotas (admin only).
    pub async fn update_user_limits(
        &self,
        account: &Account,
        user_id: &str,
        files_limit: u32,
        matching_limit: u32,
    ) -> Result<UserDetails> {
        let body = LimitsUpdate {
            user_id,
            files_limit,
            matching_limit,
        };
        let response = self
            .request(account, Method::PUT, &["users", "limits"])
            .await?
            .json(&body)
            .send()
            .await?;
        let details = decode(response, "user details").await?;
        info!(user_id, files_limit, matching_limit, "user limits updated");
        Ok(details)
    }

    /// Backend URL with each segment appended percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(format!("{}: cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(
        &self,
        account: &Account,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        let headers = self.coordinator.auth_headers(account, &self.scopes).await?;
        debug!(%method, path = url.path(), "backend request");
        Ok(self.http.request(method, url).headers(headers))
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_owned();
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), path = %url, "backend request failed");
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response, what: &'static str) -> Result<T> {
    let body = check(response).await?.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Decode {
        what,
        message: e.to_string(),
    })
}
