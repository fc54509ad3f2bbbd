use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::carrier::ImageCodec;
use crate::pipeline::extract::DecodedWatermark;
use crate::pipeline::Watermarker;

/// Outcome of scanning one candidate file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<DecodedWatermark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanReport {
    pub fn is_watermarked(&self) -> bool {
        self.decoded.as_ref().is_some_and(|d| d.valid)
    }
}

/// Extract marks from many candidate files in parallel.
///
/// Every path gets a report, in input order. A file that cannot be read or
/// decoded is reported with its error and does not stop the batch.
pub fn scan_files<C: ImageCodec + Sync>(
    marker: &Watermarker<C>,
    paths: &[PathBuf],
    show_progress: bool,
) -> Vec<ScanReport> {
    let progress = if show_progress {
        ProgressBar::new(paths.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.green/black} {pos}/{len} images ({eta})")
    {
        progress.set_style(style.progress_chars("##-"));
    }

    let reports: Vec<ScanReport> = paths
        .par_iter()
        .map(|path| {
            let report = scan_one(marker, path);
            progress.inc(1);
            report
        })
        .collect();

    progress.finish_with_message("scan complete");

    let found = reports.iter().filter(|r| r.is_watermarked()).count();
    info!("scanned {} images, {} carry a valid watermark", reports.len(), found);
    reports
}

fn scan_one<C: ImageCodec>(marker: &Watermarker<C>, path: &Path) -> ScanReport {
    let result = fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| marker.extract(&bytes).map_err(|e| e.to_string()));

    match result {
        Ok(decoded) => ScanReport {
            path: path.to_path_buf(),
            decoded: Some(decoded),
            error: None,
        },
        Err(error) => {
            warn!("skipping {}: {}", path.display(), error);
            ScanReport {
                path: path.to_path_buf(),
                decoded: None,
                error: Some(error),
            }
        }
    }
}
