//! Parallel detail fetching.
//!
//! Collection listings carry no content, so pull and push fetch every
//! resource's full record before classifying. The fetches are independent
//! and I/O-bound, so they all go out through a worker pool at once and the
//! batch is awaited collectively; one failed fetch is reported and skipped
//! without aborting the other N-1.

use super::{RemoteRecord, RemoteSummary, parse_record};
use crate::registry::RegistryEntry;
use authkit::{Client, Method};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Upper bound on concurrent detail fetches.
const FETCH_JOBS: usize = 8;

/// Result of a detail-fetch batch.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Successfully fetched records, keyed by name. Keying by name (not
    /// arrival order) keeps output independent of network completion
    /// order.
    pub records: BTreeMap<String, RemoteRecord>,
    /// Per-resource failures: (name, reason).
    pub failures: Vec<(String, String)>,
}

/// Fetch full records for every summary concurrently.
pub fn fetch_details(
    client: &Client,
    entry: &RegistryEntry,
    summaries: &[RemoteSummary],
    show_progress: bool,
) -> FetchReport {
    if summaries.is_empty() {
        return FetchReport::default();
    }

    let bar = if show_progress {
        let bar = ProgressBar::new(summaries.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("static template")
                .progress_chars("█▓░"),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let records = Mutex::new(BTreeMap::new());
    let failures = Mutex::new(Vec::new());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(FETCH_JOBS.min(summaries.len()))
        .build()
        .expect("worker pool");

    pool.install(|| {
        summaries.par_iter().for_each(|summary| {
            let path = format!("{}/{}", entry.endpoint, summary.id);
            match client.request(Method::Get, &path, None) {
                Ok(response) => {
                    let parsed = response
                        .json()
                        .and_then(|value| parse_record(value, entry.content_field));
                    match parsed {
                        Some(record) => {
                            records.lock().unwrap().insert(record.name.clone(), record);
                            bar.set_message(format!("{} ✓", summary.name));
                        }
                        None => {
                            failures.lock().unwrap().push((
                                summary.name.clone(),
                                format!("response is missing the `{}` field", entry.content_field),
                            ));
                            bar.set_message(format!("{} ✗", summary.name));
                        }
                    }
                }
                Err(e) => {
                    failures
                        .lock()
                        .unwrap()
                        .push((summary.name.clone(), e.to_string()));
                    bar.set_message(format!("{} ✗", summary.name));
                }
            }
            bar.inc(1);
        });
    });

    bar.finish_and_clear();

    let mut failures = failures.into_inner().unwrap();
    failures.sort();

    FetchReport {
        records: records.into_inner().unwrap(),
        failures,
    }
}
