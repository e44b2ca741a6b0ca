//! Projection of a raw session result into the record that gets stored.

use chrono::Utc;
use std::collections::BTreeMap;

use crate::result::{FinalResult, RawResult, Resource};

/// Filter a raw result down to what the task's data settings ask for.
///
/// Only resources with both a request and a response are kept. Cookies, DOM
/// and script metadata are copied only when enabled. Pure: the same raw
/// result always yields the same final result.
#[must_use]
pub fn project(raw: &RawResult) -> FinalResult {
    let data = raw.task.data;

    let resources = if data.resource_metadata {
        raw.requests
            .iter()
            .filter_map(|(id, requests)| {
                let responses = raw.responses.get(id)?;
                if requests.is_empty() || responses.is_empty() {
                    return None;
                }
                Some((
                    id.clone(),
                    Resource {
                        requests: requests.clone(),
                        responses: responses.clone(),
                    },
                ))
            })
            .collect()
    } else {
        BTreeMap::new()
    };

    FinalResult {
        task: raw.task.clone(),
        summary: raw.summary.clone(),
        resources,
        scripts: if data.script_metadata {
            raw.scripts.clone()
        } else {
            BTreeMap::new()
        },
        cookies: if data.cookies {
            raw.cookies.clone()
        } else {
            Vec::new()
        },
        dom: if data.dom { raw.dom.clone() } else { None },
    }
}

/// Run `project` between the postprocess begin and end timing stamps
#[must_use]
pub fn postprocess(mut raw: RawResult) -> FinalResult {
    raw.summary.timing.begin_postprocess = Some(Utc::now());
    let mut result = project(&raw);
    result.summary.timing.end_postprocess = Some(Utc::now());
    result
}
