use camino::Utf8Path;
use csv::{Reader, Writer};

use crate::domain::{FlattenedRow, ResultRow};
use crate::error::GbifImageError;

/// Rewrites the complete results table: header plus one row per input
/// specimen, in input order. Called after every processed row, so an
/// interrupted run still leaves a valid table on disk.
pub fn write_results(path: &Utf8Path, rows: &[ResultRow]) -> Result<(), GbifImageError> {
    let mut writer =
        Writer::from_path(path.as_std_path()).map_err(|err| GbifImageError::Csv(err.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| GbifImageError::Csv(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| GbifImageError::Csv(err.to_string()))
}

pub fn write_metadata(path: &Utf8Path, rows: &[FlattenedRow]) -> Result<(), GbifImageError> {
    let mut writer =
        Writer::from_path(path.as_std_path()).map_err(|err| GbifImageError::Csv(err.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| GbifImageError::Csv(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| GbifImageError::Csv(err.to_string()))
}

/// Reads a metadata table written by `write_metadata`, or one constructed
/// independently with the same columns. A missing `citation_doi` column
/// reads as a missing value.
pub fn read_metadata(path: &Utf8Path) -> Result<Vec<FlattenedRow>, GbifImageError> {
    let mut reader = Reader::from_path(path.as_std_path()).map_err(|err| {
        GbifImageError::MetadataRead {
            path: path.to_string(),
            message: err.to_string(),
        }
    })?;
    let mut rows = Vec::new();
    for record in reader.deserialize::<FlattenedRow>() {
        let row = record.map_err(|err| GbifImageError::MetadataRead {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;
    use crate::domain::RowStatus;

    fn sample_row() -> FlattenedRow {
        FlattenedRow {
            scientific_name: Some("Quercus robur L.".to_string()),
            species: Some("Quercus robur".to_string()),
            institution_code: Some("K".to_string()),
            country: Some("United Kingdom".to_string()),
            event_date: Some("1998-06-01".to_string()),
            rights_holder: None,
            key: Some("1234".to_string()),
            gbif_id: Some("1234".to_string()),
            license: Some("CC0".to_string()),
            media_url: "https://a.example/1.jpg".to_string(),
            citation_doi: None,
        }
    }

    #[test]
    fn results_header_order_is_fixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("results.csv")).unwrap();

        let mut row = ResultRow::pending(&sample_row());
        row.original_filesize = Some(2048);
        row.megapixels = Some(0.25);
        row.status = Some(RowStatus::Succeeded);
        write_results(&path, &[row]).unwrap();

        let content = std::fs::read_to_string(path.as_std_path()).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "scientificName,gbifID,institutionCode,eventDate,country,license,\
             rightsHolder,original_filesize,megapixels,status,error_message"
        );
        let data = content.lines().nth(1).unwrap();
        assert!(data.contains("succeeded"));
        assert!(data.contains("2048"));
        assert!(data.ends_with(','), "pending error_message must be empty");
    }

    #[test]
    fn pending_rows_serialize_with_empty_run_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("results.csv")).unwrap();

        write_results(&path, &[ResultRow::pending(&sample_row())]).unwrap();
        let content = std::fs::read_to_string(path.as_std_path()).unwrap();
        let data = content.lines().nth(1).unwrap();
        assert!(data.ends_with(",,,,"), "filesize/megapixels/status/error empty");
    }

    #[test]
    fn metadata_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("metadata.csv")).unwrap();

        let mut with_doi = sample_row();
        with_doi.citation_doi = Some("10.15468/dl.abc123".to_string());
        write_metadata(&path, &[sample_row(), with_doi.clone()]).unwrap();

        let rows = read_metadata(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], sample_row());
        assert_eq!(rows[1], with_doi);
    }

    #[test]
    fn metadata_without_doi_column_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("metadata.csv")).unwrap();
        std::fs::write(
            path.as_std_path(),
            "scientificName,species,institutionCode,country,eventDate,rightsHolder,\
             key,gbifID,license,media_url\n\
             Quercus robur L.,Quercus robur,K,,,,1234,1234,CC0,https://a.example/1.jpg\n",
        )
        .unwrap();

        let rows = read_metadata(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].citation_doi, None);
        assert_eq!(rows[0].media_url, "https://a.example/1.jpg");
    }
}
