//! Check-in fan-out: stage a package folder and issue one independent
//! `check-in` request per staged file.
//!
//! There is no aggregate acknowledgment on the wire: completion of the
//! whole job is the union of N independent request completions, observed
//! here by counting callbacks as they fire, in whatever order the server
//! answers.

use crate::comm::requests::Requests;
use crate::comm::responses::CheckInResponse;
use crate::error::Result;
use crate::staging::{scan_folder, stage_files};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Parameters for a folder check-in.
#[derive(Debug, Clone)]
pub struct CheckInFolder {
    pub package: String,
    pub namespace: String,
    pub description: String,
    pub category: Option<String>,
    /// Folder whose matching files are checked in.
    pub source_dir: PathBuf,
    /// Staging location the matches are copied into before sending.
    pub staging_dir: PathBuf,
    /// Filename patterns, applied in order (e.g. `*.h` then `*.cpp`).
    pub patterns: Vec<String>,
    pub user_id: String,
    pub verbose: bool,
}

type CompleteFn = Box<dyn FnOnce(Vec<CheckInResponse>) + Send + 'static>;

struct Fanout {
    responses: Vec<CheckInResponse>,
    expected: usize,
    on_complete: Option<CompleteFn>,
}

/// Stage every pattern match under `options.source_dir` and issue one
/// `check-in` request per staged file, each with its own correlation ID
/// and callback. `on_complete` fires once every per-file callback has
/// fired. An empty match set completes immediately. Returns the number of
/// requests issued.
pub async fn check_in_folder<F>(
    requests: &Requests,
    options: &CheckInFolder,
    on_complete: F,
) -> Result<usize>
where
    F: FnOnce(Vec<CheckInResponse>) + Send + 'static,
{
    let patterns: Vec<&str> = options.patterns.iter().map(String::as_str).collect();
    let files = scan_folder(&options.source_dir, &patterns)?;
    let staged = stage_files(&files, &options.staging_dir).await?;

    let names: Vec<String> = staged
        .iter()
        .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_owned))
        .collect();
    let total = names.len();
    debug!(
        total,
        source = %options.source_dir.display(),
        "staged files for check-in"
    );
    if total == 0 {
        on_complete(Vec::new());
        return Ok(0);
    }

    let fanout = Arc::new(Mutex::new(Fanout {
        responses: Vec::with_capacity(total),
        expected: total,
        on_complete: Some(Box::new(on_complete)),
    }));

    let mut issued = 0;
    for name in &names {
        let state = fanout.clone();
        let result = requests
            .check_in(
                &options.package,
                &options.namespace,
                &options.description,
                options.category.as_deref(),
                name,
                &options.user_id,
                options.verbose,
                move |response| complete_one(&state, response),
            )
            .await;
        match result {
            Ok(()) => issued += 1,
            Err(e) => {
                // Requests already in flight may still complete; only count
                // the ones that actually left.
                shrink_expected(&fanout, issued);
                return Err(e);
            }
        }
    }
    Ok(issued)
}

fn complete_one(fanout: &Arc<Mutex<Fanout>>, response: CheckInResponse) {
    let finished = {
        let mut state = lock(fanout);
        state.responses.push(response);
        take_if_done(&mut state)
    };
    if let Some((on_complete, responses)) = finished {
        on_complete(responses);
    }
}

fn shrink_expected(fanout: &Arc<Mutex<Fanout>>, expected: usize) {
    let finished = {
        let mut state = lock(fanout);
        state.expected = expected;
        take_if_done(&mut state)
    };
    if let Some((on_complete, responses)) = finished {
        on_complete(responses);
    }
}

fn take_if_done(state: &mut Fanout) -> Option<(CompleteFn, Vec<CheckInResponse>)> {
    if state.responses.len() >= state.expected {
        state
            .on_complete
            .take()
            .map(|cb| (cb, std::mem::take(&mut state.responses)))
    } else {
        None
    }
}

fn lock(fanout: &Arc<Mutex<Fanout>>) -> std::sync::MutexGuard<'_, Fanout> {
    fanout.lock().unwrap_or_else(PoisonError::into_inner)
}
