//! Backend wire types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Candidate CV
    #[serde(rename = "CV")]
    Cv,
    /// Job description
    #[serde(rename = "JD")]
    Jd,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Cv => "CV",
            FileType::Jd => "JD",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored CV or job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmpFile {
    pub id: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub user_id: String,
    #[serde(default)]
    pub url: String,
    /// Extracted text
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<String>,
    #[serde(default)]
    pub education: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvMatch {
    #[serde(default)]
    pub skills_match: Vec<String>,
    #[serde(default)]
    pub experience_match: Vec<String>,
    #[serde(default)]
    pub education_match: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
}

/// Comparison of one CV against one job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: String,
    pub user_id: String,
    pub cv: RmpFile,
    pub jd: RmpFile,
    pub jd_requirements: Profile,
    pub candidate_capabilities: Profile,
    pub cv_match: CvMatch,
    pub overall_match_percentage: f64,
}

/// Account usage and quotas, as returned by the admin endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub files_limit: u32,
    pub matching_limit: u32,
    pub files_count: u32,
    pub matching_used_count: u32,
}

/// Body of `PUT users/limits`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LimitsUpdate<'a> {
    pub user_id: &'a str,
    pub files_limit: u32,
    pub matching_limit: u32,
}

/// A document to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FilesEnvelope {
    pub files: Vec<RmpFile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultsEnvelope {
    pub results: Vec<MatchResult>,
}
