use regex::Regex;
use serde_json::Value;

use crate::domain::FlattenedRow;

const EXCLUDED_HOST_MARKER: &str = "inaturalist";

/// Turns GBIF occurrence records into one row per qualifying media URL.
///
/// Per media item, every value under `identifier` is a candidate URL
/// (upstream sometimes carries parallel array values under the one key).
/// Candidates containing `manifest` are dropped, a redundant trailing `gbif`
/// marker is stripped, and each survivor is paired with the `license` value
/// at the same array position. Rows pointing at the citizen-science image
/// host are removed in a final pass.
pub fn flatten_occurrences(records: &[Value]) -> Vec<FlattenedRow> {
    let mut rows = Vec::new();
    for record in records {
        let media_items = record
            .get("media")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for media in &media_items {
            let licenses = string_values(media.get("license"));
            for (index, raw) in string_values(media.get("identifier")).into_iter().enumerate() {
                let Some(url) = clean_url(&raw) else {
                    continue;
                };
                rows.push(FlattenedRow {
                    scientific_name: field(record, "scientificName"),
                    species: field(record, "species"),
                    institution_code: field(record, "institutionCode"),
                    country: field(record, "country"),
                    event_date: field(record, "eventDate"),
                    rights_holder: field(record, "rightsHolder"),
                    key: field(record, "key"),
                    gbif_id: field(record, "gbifID"),
                    license: licenses.get(index).cloned(),
                    media_url: url,
                    citation_doi: None,
                });
            }
        }
    }
    rows.retain(|row| !row.media_url.contains(EXCLUDED_HOST_MARKER));
    rows
}

/// Drops `manifest` pseudo-URLs and strips an exact trailing `gbif` marker.
pub fn clean_url(raw: &str) -> Option<String> {
    if raw.contains("manifest") {
        return None;
    }
    let cleaned = raw.strip_suffix("gbif").unwrap_or(raw);
    if cleaned.is_empty() {
        return None;
    }
    Some(cleaned.to_string())
}

/// Square WKT polygon centered on (lat, lon), sized by `buffer` in the
/// coordinate units of the upstream API. WKT vertex order is lon lat.
pub fn wkt_square(lat: f64, lon: f64, buffer: f64) -> String {
    let west = lon - buffer;
    let east = lon + buffer;
    let south = lat - buffer;
    let north = lat + buffer;
    format!(
        "POLYGON(({west} {south}, {east} {south}, {east} {north}, {west} {north}, {west} {south}))"
    )
}

/// Best-effort scan of a download-request response for a `DOI:`-labeled
/// value. Upstream returns free text; a format change yields `None`, never
/// an error.
pub fn extract_doi(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\bDOI:\s*(\S+)").unwrap();
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
}

fn field(record: &Value, key: &str) -> Option<String> {
    match record.get(key) {
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(value)) => Some(value.to_string()),
        Some(Value::Bool(value)) => Some(value.to_string()),
        _ => None,
    }
}

fn string_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(|v| v.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn clean_url_strips_trailing_marker() {
        assert_eq!(
            clean_url("https://example.org/image.jpggbif").as_deref(),
            Some("https://example.org/image.jpg")
        );
        assert_eq!(
            clean_url("https://example.org/image.jpg").as_deref(),
            Some("https://example.org/image.jpg")
        );
    }

    #[test]
    fn clean_url_drops_manifest() {
        assert_eq!(clean_url("https://example.org/iiif/manifest.json"), None);
    }

    #[test]
    fn flatten_emits_one_row_per_candidate() {
        let record = json!({
            "scientificName": "Quercus robur L.",
            "species": "Quercus robur",
            "key": 1234,
            "gbifID": "1234",
            "media": [
                {
                    "identifier": ["https://a.example/1.jpg", "https://a.example/2.jpg"],
                    "license": ["CC0", "CC-BY-4.0"]
                },
                { "identifier": "https://a.example/3.jpg", "license": "CC0" }
            ]
        });

        let rows = flatten_occurrences(&[record]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].media_url, "https://a.example/1.jpg");
        assert_eq!(rows[0].license.as_deref(), Some("CC0"));
        assert_eq!(rows[1].media_url, "https://a.example/2.jpg");
        assert_eq!(rows[1].license.as_deref(), Some("CC-BY-4.0"));
        assert_eq!(rows[2].license.as_deref(), Some("CC0"));
        assert!(rows.iter().all(|row| row.species.as_deref() == Some("Quercus robur")));
        assert!(rows.iter().all(|row| row.key.as_deref() == Some("1234")));
    }

    #[test]
    fn flatten_drops_excluded_host_regardless_of_license() {
        let record = json!({
            "media": [{
                "identifier": "https://static.inaturalist.org/photos/1/original.jpg",
                "license": "CC0"
            }]
        });
        assert!(flatten_occurrences(&[record]).is_empty());
    }

    #[test]
    fn flatten_skips_media_without_identifier() {
        let record = json!({ "media": [{ "license": "CC0" }] });
        assert!(flatten_occurrences(&[record]).is_empty());
    }

    #[test]
    fn wkt_square_corners() {
        let wkt = wkt_square(50.0, 14.0, 1.0);
        assert_eq!(
            wkt,
            "POLYGON((13 49, 15 49, 15 51, 13 51, 13 49))"
        );
    }

    #[test]
    fn extract_doi_from_response_line() {
        let text = "Download request accepted.\nDOI: 10.15468/dl.abc123\nStatus: PREPARING";
        assert_eq!(extract_doi(text).as_deref(), Some("10.15468/dl.abc123"));
    }

    #[test]
    fn extract_doi_absent() {
        assert_eq!(extract_doi("Download request accepted."), None);
    }
}
