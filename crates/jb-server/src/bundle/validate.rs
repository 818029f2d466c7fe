//! Request body validation and filename normalization.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{FileRequest, ValidatedFileSet};
use jb_common::config::AppConfig;
use jb_common::AppError;

/// Raw body of a bundle request. `files` stays untyped so a wrong shape
/// can be reported as a file-list problem instead of a parse error.
#[derive(Debug, Deserialize)]
struct BundleRequest {
    #[serde(default)]
    files: Option<Value>,
    #[serde(default, rename = "zipFilename")]
    zip_filename: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct BundleOrder {
    pub files: ValidatedFileSet,
    /// Sanitized archive name, if the client asked for one.
    pub zip_filename: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("files must be a non-empty array")]
    MissingFiles,

    #[error("Too many files: {count} requested, at most {max} allowed")]
    TooManyFiles { count: usize, max: usize },

    #[error("files[{index}] is missing {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL not allowed: {0}")]
    DisallowedUrl(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Checks bundle requests against the URL allow-list and naming rules.
#[derive(Debug, Clone)]
pub struct Validator {
    allowed_prefixes: Vec<String>,
    member_suffix: String,
    max_files: usize,
}

impl Validator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            allowed_prefixes: config.fetch.allowed_prefixes.clone(),
            member_suffix: config.bundle.member_suffix.clone(),
            max_files: config.bundle.max_files,
        }
    }

    /// Parse and validate a raw JSON body.
    pub fn validate(&self, body: &[u8]) -> Result<BundleOrder, ValidationError> {
        let request: BundleRequest = serde_json::from_slice(body)
            .map_err(|e| ValidationError::InvalidBody(e.to_string()))?;

        let entries = match request.files {
            Some(Value::Array(entries)) if !entries.is_empty() => entries,
            _ => return Err(ValidationError::MissingFiles),
        };

        if entries.len() > self.max_files {
            return Err(ValidationError::TooManyFiles {
                count: entries.len(),
                max: self.max_files,
            });
        }

        let files = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| self.validate_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BundleOrder {
            files: ValidatedFileSet::new(files),
            zip_filename: request.zip_filename.as_deref().and_then(sanitize_zip_filename),
        })
    }

    fn validate_entry(&self, index: usize, entry: &Value) -> Result<FileRequest, ValidationError> {
        let field = |name: &'static str| {
            entry
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(ValidationError::MissingField { index, field: name })
        };
        let url = field("url")?;
        let filename = field("filename")?;

        self.check_url(url)?;

        if filename.contains(['/', '\\']) || filename.split('.').all(|part| part.is_empty()) {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }

        Ok(FileRequest {
            url: url.to_string(),
            filename: normalize_filename(filename, &self.member_suffix),
        })
    }

    fn check_url(&self, raw: &str) -> Result<(), ValidationError> {
        let parsed = Url::parse(raw).map_err(|_| ValidationError::InvalidUrl(raw.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidUrl(raw.to_string()));
        }

        if !self.allowed_prefixes.iter().any(|p| raw.starts_with(p.as_str())) {
            return Err(ValidationError::DisallowedUrl(raw.to_string()));
        }

        Ok(())
    }
}

/// Append `suffix` unless `filename` already ends with it, ignoring case.
pub fn normalize_filename(filename: &str, suffix: &str) -> String {
    if filename
        .to_ascii_lowercase()
        .ends_with(&suffix.to_ascii_lowercase())
    {
        filename.to_string()
    } else {
        format!("{}{}", filename, suffix)
    }
}

/// Make a client-supplied archive name safe for a Content-Disposition header.
/// Returns `None` when nothing usable is left.
fn sanitize_zip_filename(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '"' | '/' | '\\') && !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return None;
    }

    Some(normalize_filename(cleaned, ".zip"))
}
