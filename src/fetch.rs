use std::collections::BTreeSet;
use std::fs;
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use tracing::{debug, info};

use crate::domain::{FlattenedRow, ResultRow, RowStatus};
use crate::error::GbifImageError;
use crate::image_ops;
use crate::media::MediaFetcher;
use crate::results::write_results;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Directory for downloaded images, created recursively if absent.
    pub output_dir: Utf8PathBuf,
    /// Path of the results table, fully rewritten after every row.
    pub results_path: Utf8PathBuf,
    /// Re-encode every image at this JPEG quality (1..=100).
    pub quality: Option<u8>,
    /// Downscale images above this megapixel count. Ignored when `quality`
    /// is set.
    pub max_megapixels: Option<f64>,
    /// Unconditional pause after every download attempt, the fixed rate
    /// limit against the media hosts.
    pub delay: Duration,
}

/// Stage 2: download each row's image in input order, measure it, apply the
/// configured transform, and keep the results table on disk current. One
/// row's failure never stops the batch; the only batch-fatal condition is an
/// empty input set, checked before anything touches the filesystem.
pub fn fetch_and_transform<F: MediaFetcher>(
    fetcher: &F,
    rows: &[FlattenedRow],
    options: &FetchOptions,
) -> Result<Vec<ResultRow>, GbifImageError> {
    if rows.is_empty() {
        return Err(GbifImageError::EmptyMetadata);
    }

    fs::create_dir_all(options.output_dir.as_std_path())
        .map_err(|err| GbifImageError::Filesystem(err.to_string()))?;

    let mut results: Vec<ResultRow> = rows.iter().map(ResultRow::pending).collect();

    for (index, row) in rows.iter().enumerate() {
        let destination = options.output_dir.join(row.destination_filename());
        debug!(url = %row.media_url, destination = %destination, "fetching media");

        let fetched = fetcher.download(&row.media_url, destination.as_std_path());
        thread::sleep(options.delay);

        match fetched {
            Err(err) => results[index].mark_failed(err.to_string()),
            Ok(()) => process_downloaded(&mut results[index], &destination, options),
        }

        write_results(&options.results_path, &results)?;
    }

    credit_institutions(&results);
    Ok(results)
}

/// Measures a freshly downloaded file and applies the optional transform.
/// A transform failure flips the row to failed but keeps the measurements
/// taken at download time.
fn process_downloaded(result: &mut ResultRow, destination: &Utf8PathBuf, options: &FetchOptions) {
    let measured = match image_ops::measure(destination.as_std_path()) {
        Ok(measured) => measured,
        Err(err) => {
            result.mark_failed(err.to_string());
            return;
        }
    };
    result.original_filesize = Some(measured.file_size);
    result.megapixels = Some(measured.megapixels());
    result.status = Some(RowStatus::Succeeded);

    if let Some(quality) = options.quality {
        if let Err(err) = image_ops::recompress(destination.as_std_path(), quality) {
            result.mark_failed(err.to_string());
        }
    } else if let Some(cap) = options.max_megapixels {
        let current = measured.megapixels();
        if current > cap {
            let percent = image_ops::scale_percent(current, cap);
            match image_ops::rescale(destination.as_std_path(), percent) {
                Ok(rescaled) => {
                    result.megapixels = Some(image_ops::round4(rescaled.megapixels()));
                }
                Err(err) => result.mark_failed(err.to_string()),
            }
        }
    }
}

fn credit_institutions(results: &[ResultRow]) {
    let institutions: BTreeSet<&str> = results
        .iter()
        .filter_map(|row| row.institution_code.as_deref())
        .collect();
    if !institutions.is_empty() {
        let list = institutions.into_iter().collect::<Vec<_>>().join(", ");
        info!("images provided by the following institutions, please credit them: {list}");
    }
}
