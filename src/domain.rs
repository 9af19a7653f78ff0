use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Upstream record-type selector. `herbarium` and `cs` map to known
/// basis-of-record values; anything else is passed through to GBIF unmapped
/// so future upstream values are not silently rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    Herbarium,
    CitizenScience,
    Other(String),
}

impl RecordType {
    pub fn basis_of_record(&self) -> &str {
        match self {
            RecordType::Herbarium => "PRESERVED_SPECIMEN",
            RecordType::CitizenScience => "HUMAN_OBSERVATION",
            RecordType::Other(value) => value,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Herbarium => write!(f, "herbarium"),
            RecordType::CitizenScience => write!(f, "cs"),
            RecordType::Other(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        match value.trim() {
            "herbarium" => RecordType::Herbarium,
            "cs" => RecordType::CitizenScience,
            other => RecordType::Other(other.to_string()),
        }
    }
}

impl FromStr for RecordType {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(RecordType::from(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Succeeded,
    Failed,
}

/// Credentials for the formal GBIF download request. All three fields are
/// required before a request is issued.
#[derive(Debug, Clone)]
pub struct DownloadCredentials {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// One occurrence-media pair surfaced as an independent tabular row. Scalar
/// occurrence fields are duplicated across the rows of one occurrence; media
/// is never nested. `media_url` is non-empty by construction: a row only
/// exists for a qualifying URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenedRow {
    #[serde(rename = "scientificName")]
    pub scientific_name: Option<String>,
    pub species: Option<String>,
    #[serde(rename = "institutionCode")]
    pub institution_code: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "eventDate")]
    pub event_date: Option<String>,
    #[serde(rename = "rightsHolder")]
    pub rights_holder: Option<String>,
    pub key: Option<String>,
    #[serde(rename = "gbifID")]
    pub gbif_id: Option<String>,
    pub license: Option<String>,
    pub media_url: String,
    #[serde(default)]
    pub citation_doi: Option<String>,
}

impl FlattenedRow {
    /// Destination filename for the downloaded image:
    /// `<species with spaces as underscores, or "indet">_<key>.jpeg`.
    /// Rows sharing species and key collide and silently overwrite each
    /// other; that is a property of the naming scheme, not an error.
    pub fn destination_filename(&self) -> String {
        let species = self
            .species
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.trim().replace(' ', "_"))
            .unwrap_or_else(|| "indet".to_string());
        let key = self.key.as_deref().unwrap_or("unknown");
        format!("{species}_{key}.jpeg")
    }
}

/// One results-table row per input `FlattenedRow`. Field order here is the
/// persisted CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(rename = "scientificName")]
    pub scientific_name: Option<String>,
    #[serde(rename = "gbifID")]
    pub gbif_id: Option<String>,
    #[serde(rename = "institutionCode")]
    pub institution_code: Option<String>,
    #[serde(rename = "eventDate")]
    pub event_date: Option<String>,
    pub country: Option<String>,
    pub license: Option<String>,
    #[serde(rename = "rightsHolder")]
    pub rights_holder: Option<String>,
    pub original_filesize: Option<u64>,
    pub megapixels: Option<f64>,
    pub status: Option<RowStatus>,
    pub error_message: Option<String>,
}

impl ResultRow {
    /// Pending row for one input, before its download is attempted. Any
    /// identifying field absent from the metadata stays a missing value
    /// rather than failing the row.
    pub fn pending(row: &FlattenedRow) -> Self {
        Self {
            scientific_name: row.scientific_name.clone(),
            gbif_id: row.gbif_id.clone(),
            institution_code: row.institution_code.clone(),
            event_date: row.event_date.clone(),
            country: row.country.clone(),
            license: row.license.clone(),
            rights_holder: row.rights_holder.clone(),
            original_filesize: None,
            megapixels: None,
            status: None,
            error_message: None,
        }
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = Some(RowStatus::Failed);
        self.error_message = Some(message.into());
    }
}
