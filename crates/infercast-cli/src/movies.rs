//! The movie synopsis and movie details batch tasks.

use anyhow::{bail, Result};
use infercast_common::Transport;
use infercast_dispatcher::{Dispatcher, ResultMap};
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{info, warn};

use crate::prompts::{details_prompts, synopsis_prompts};
use crate::repair::{extract_title, repair_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieTask {
    /// Free-text plot summary per title
    Synopsis,
    /// JSON object per title, repaired and keyed by title
    Details,
}

impl FromStr for MovieTask {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "synopsis" => Ok(Self::Synopsis),
            "details" => Ok(Self::Details),
            other => Err(format!(
                "unknown task '{}', expected 'synopsis' or 'details'",
                other
            )),
        }
    }
}

/// Dispatches one synopsis prompt per title; returns the raw result map.
pub async fn run_synopsis<T: Transport>(
    dispatcher: &Dispatcher<T>,
    titles: &[String],
) -> Result<ResultMap> {
    info!("Generating synopsis prompts for {} movies", titles.len());
    let report = dispatcher.dispatch(synopsis_prompts(titles)).await?;
    Ok(report.into_results())
}

/// Collects a details object for every title that yields valid JSON.
///
/// Titles whose response is missing or does not repair into JSON are sent
/// again with a fresh seed, for at most `rounds` batches in total. Only a
/// failure of the first batch is an error; a later one ends the rounds
/// early and returns what was collected.
pub async fn run_details<T, R>(
    dispatcher: &Dispatcher<T>,
    titles: &[String],
    rounds: u32,
    rng: &mut R,
) -> Result<BTreeMap<String, Value>>
where
    T: Transport,
    R: Rng + ?Sized,
{
    if rounds == 0 {
        bail!("details task needs at least one round");
    }

    let mut details = BTreeMap::new();
    let mut pending: Vec<String> = titles.to_vec();

    for round in 1..=rounds {
        info!(round, pending = pending.len(), "Requesting movie details");
        let report = match dispatcher.dispatch(details_prompts(&pending, rng)).await {
            Ok(report) => report,
            Err(e) if round > 1 => {
                warn!(
                    "Round {} failed, keeping {} details already collected: {}",
                    round,
                    details.len(),
                    e
                );
                break;
            }
            Err(e) => return Err(e.into()),
        };

        for (prompt, response) in &report.results {
            let Some(title) = extract_title(prompt) else {
                continue;
            };
            match response.text().and_then(repair_json) {
                Some(value) => {
                    details.insert(title.to_string(), value);
                }
                None => warn!("Response for {:?} is not valid JSON", title),
            }
        }

        pending.retain(|title| !details.contains_key(title));
        if pending.is_empty() {
            break;
        }
    }

    if !pending.is_empty() {
        warn!(
            "No valid details after {} rounds for: {}",
            rounds,
            pending.join(", ")
        );
    }
    Ok(details)
}
