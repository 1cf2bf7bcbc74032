//! Records collected by the application wizard.
//!
//! Stored drafts may be old or hand-edited, so every field deserializes
//! leniently: a missing or malformed value becomes the field's default
//! instead of failing the whole draft.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::models::UploadedFile;

/// Deserialize a field, falling back to `T::default()` when the stored
/// value has the wrong shape.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Deserialize a list, dropping elements that are not records at all.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(records_from_value(value))
}

/// Records of a stored list. Anything other than an array yields no records.
pub(crate) fn records_from_value<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        if !value.is_null() {
            warn!("Stored draft section is not a list, ignoring it");
        }
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Dropping malformed draft record");
                None
            }
        })
        .collect()
}

/// File attachment of a record.
///
/// `Uploading` only exists in memory; it is persisted as unattached because
/// an interrupted upload cannot be resumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<UploadedFile>", into = "Option<UploadedFile>")]
pub enum Attachment {
    #[default]
    Unattached,
    Uploading {
        file_name: String,
        ticket: u64,
    },
    Uploaded(UploadedFile),
}

impl Attachment {
    pub fn uploaded(&self) -> Option<&UploadedFile> {
        match self {
            Attachment::Uploaded(file) => Some(file),
            _ => None,
        }
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self, Attachment::Uploading { .. })
    }
}

impl From<Option<UploadedFile>> for Attachment {
    fn from(file: Option<UploadedFile>) -> Self {
        file.map_or(Attachment::Unattached, Attachment::Uploaded)
    }
}

impl From<Attachment> for Option<UploadedFile> {
    fn from(attachment: Attachment) -> Self {
        match attachment {
            Attachment::Uploaded(file) => Some(file),
            Attachment::Unattached | Attachment::Uploading { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub school_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub school_gpa: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub graduation_year: i32,
    #[serde(default, deserialize_with = "lenient")]
    pub certificate: Attachment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardian {
    #[serde(default, deserialize_with = "lenient")]
    pub full_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub relation: String,
    #[serde(default, deserialize_with = "lenient")]
    pub phone: String,
}

/// An olympiad or competition award.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Olympic {
    #[serde(default, deserialize_with = "lenient")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient")]
    pub place: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub year: i32,
    #[serde(default, deserialize_with = "lenient")]
    pub certificate: Attachment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, deserialize_with = "lenient")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub file: Attachment,
}

/// The not-yet-submitted application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    #[serde(default, deserialize_with = "lenient_list")]
    pub education: Vec<EducationInfo>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub guardians: Vec<Guardian>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub olympics: Vec<Olympic>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub documents: Vec<Document>,
}

impl ApplicationDraft {
    pub fn is_empty(&self) -> bool {
        self.education.is_empty()
            && self.guardians.is_empty()
            && self.olympics.is_empty()
            && self.documents.is_empty()
    }
}
