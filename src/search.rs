use tracing::{debug, info, warn};

use crate::domain::{DownloadCredentials, FlattenedRow, RecordType};
use crate::error::GbifImageError;
use crate::flatten::{extract_doi, flatten_occurrences, wkt_square};
use crate::gbif::GbifClient;

/// Taxonomic key for kingdom Plantae; applied whenever a geographic filter
/// is active.
const PLANTAE_KINGDOM_KEY: u32 = 6;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub taxon: Option<String>,
    /// Center point as (latitude, longitude).
    pub center: Option<(f64, f64)>,
    /// Half-width of the square geographic filter, in the coordinate units
    /// of the upstream API.
    pub buffer_distance: f64,
    pub limit: u32,
    pub record_type: RecordType,
    /// Arbitrary passthrough filter parameters, sent upstream verbatim.
    pub extra_filters: Vec<(String, String)>,
    pub credentials: Option<DownloadCredentials>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            taxon: None,
            center: None,
            buffer_distance: 1.0,
            limit: 100,
            record_type: RecordType::Herbarium,
            extra_filters: Vec::new(),
            credentials: None,
        }
    }
}

/// Stage 1: query GBIF for occurrences with still images and flatten the
/// result into one row per qualifying media URL. When full credentials are
/// supplied, one formal download request covering the whole batch is issued
/// and its DOI attached to every row; failure there degrades to a missing
/// citation, never a search failure.
pub fn search_media<C: GbifClient>(
    client: &C,
    options: &SearchOptions,
) -> Result<Vec<FlattenedRow>, GbifImageError> {
    let params = build_query(options);
    debug!(?params, "gbif occurrence search");
    let records = client.search_occurrences(&params)?;

    let mut rows = flatten_occurrences(&records);
    info!(
        taxon = options.taxon.as_deref().unwrap_or("<any>"),
        rows = rows.len(),
        "flattened occurrence rows with media data"
    );

    if let Some(credentials) = &options.credentials {
        if let Some(doi) = request_citation_doi(client, &rows, credentials) {
            for row in &mut rows {
                row.citation_doi = Some(doi.clone());
            }
        }
    }

    Ok(rows)
}

fn build_query(options: &SearchOptions) -> Vec<(String, String)> {
    let mut params = vec![
        ("mediaType".to_string(), "StillImage".to_string()),
        (
            "basisOfRecord".to_string(),
            options.record_type.basis_of_record().to_string(),
        ),
        ("limit".to_string(), options.limit.to_string()),
    ];
    if let Some(taxon) = &options.taxon {
        params.push(("scientificName".to_string(), taxon.clone()));
    }
    if let Some((lat, lon)) = options.center {
        params.push((
            "geometry".to_string(),
            wkt_square(lat, lon, options.buffer_distance),
        ));
        params.push((
            "kingdomKey".to_string(),
            PLANTAE_KINGDOM_KEY.to_string(),
        ));
    }
    params.extend(options.extra_filters.iter().cloned());
    params
}

fn request_citation_doi<C: GbifClient>(
    client: &C,
    rows: &[FlattenedRow],
    credentials: &DownloadCredentials,
) -> Option<String> {
    let gbif_ids: Vec<String> = rows
        .iter()
        .filter_map(|row| row.gbif_id.clone())
        .collect();
    if gbif_ids.is_empty() {
        warn!("no gbif ids in batch, skipping download request");
        return None;
    }
    match client.request_download(&gbif_ids, credentials) {
        Ok(response) => {
            let doi = extract_doi(&response);
            if doi.is_none() {
                warn!("download request accepted but no DOI line found in response");
            }
            doi
        }
        Err(err) => {
            warn!(error = %err, "download request failed, citation DOI unavailable");
            None
        }
    }
}
