//! Job handlers: Clean, Submit, Run, Cancel, SetConfig, Shutdown

use std::sync::mpsc::Sender;
use std::thread;
use std::time::Instant;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::OutputKind;
use crate::job::{run_job, run_jobs, JobRecord};
use crate::server::protocol::{error_codes, Response};
use crate::server::state::{RunAsyncResult, ServerState};

fn invalid_params(id: Option<serde_json::Value>, expected: &str) -> Response {
    Response::error(id, error_codes::INVALID_PARAMS, format!("Invalid params: expected {}", expected))
}

/// Handle Clean request - runs one job synchronously and stores its result
pub fn handle_clean(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct CleanParams {
        record: Vec<i32>,
        #[serde(default)]
        output: Option<OutputKind>,
        #[serde(default)]
        max_tries: Option<usize>,
    }

    let params: CleanParams = match params.and_then(|p| serde_json::from_value(p).ok()) {
        Some(p) => p,
        None => return invalid_params(id, "{record: [int], output?: string, max_tries?: int}"),
    };

    let record = match JobRecord::from_flat(&params.record) {
        Ok(r) => r,
        Err(e) => return Response::error(id, error_codes::INVALID_PARAMS, format!("Invalid record: {}", e)),
    };

    let mut config = state.config.clone();
    if let Some(output) = params.output {
        config.output = output;
    }
    if let Some(max_tries) = params.max_tries {
        config.max_tries = max_tries;
    }

    match run_job(&record, &config) {
        Ok(result) => {
            let value = serde_json::to_value(&result).unwrap_or(serde_json::Value::Null);
            state.results.insert(record.key(), result);
            Response::success(id, value)
        }
        Err(e) => Response::error(id, error_codes::JOB_FAILED, format!("Job failed: {}", e)),
    }
}

/// Handle Submit request - queues one or more records for the next Run
pub fn handle_submit(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct SubmitParams {
        #[serde(default)]
        record: Option<Vec<i32>>,
        #[serde(default)]
        records: Vec<Vec<i32>>,
    }

    let params: SubmitParams = match params.and_then(|p| serde_json::from_value(p).ok()) {
        Some(p) => p,
        None => return invalid_params(id, "{record: [int]} or {records: [[int]]}"),
    };

    let flat: Vec<Vec<i32>> = params.record.into_iter().chain(params.records).collect();
    if flat.is_empty() {
        return invalid_params(id, "at least one record");
    }

    let mut parsed = Vec::with_capacity(flat.len());
    for (index, values) in flat.iter().enumerate() {
        match JobRecord::from_flat(values) {
            Ok(r) => parsed.push(r),
            Err(e) => {
                return Response::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid record {}: {}", index, e),
                )
            }
        }
    }

    state.queue.extend(parsed);
    Response::success(id, serde_json::json!({
        "status": "ok",
        "queued": state.queue.len()
    }))
}

/// Handle Run request - cleans the queue on a background thread
pub fn handle_run_async(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    tx: &Sender<RunAsyncResult>,
) -> Response {
    if state.running {
        return Response::error(id, error_codes::RUN_IN_PROGRESS, "A batch is already running".to_string());
    }
    if state.queue.is_empty() {
        return Response::error(id, error_codes::NOTHING_QUEUED, "No jobs queued. Call Submit first.".to_string());
    }

    let records = std::mem::take(&mut state.queue);
    let config = state.config.clone();
    let cancel = state.arm_cancel();
    let tx = tx.clone();
    let job_count = records.len();
    state.running = true;

    info!(jobs = job_count, threads = ?config.threads, "starting batch");

    thread::spawn(move || {
        let start = Instant::now();
        let batch = run_jobs(&records, &config, &cancel);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let _ = tx.send(RunAsyncResult { batch, elapsed_ms });
    });

    Response::success(id, serde_json::json!({
        "status": "started",
        "jobs": job_count
    }))
}

/// Fold a finished batch into the state and build the `cleanComplete` notification
pub fn handle_run_complete(state: &mut ServerState, result: RunAsyncResult) -> serde_json::Value {
    match result.batch {
        Ok(batch) => {
            let succeeded = batch.results.len();
            let failed = batch.failures.len();
            state.absorb(batch);
            info!(succeeded, failed, elapsed_ms = result.elapsed_ms, "batch complete");
            serde_json::json!({
                "id": null,
                "method": "cleanComplete",
                "result": {
                    "status": "ok",
                    "succeeded": succeeded,
                    "failed": failed,
                    "elapsed_ms": result.elapsed_ms
                }
            })
        }
        Err(e) => {
            state.running = false;
            warn!(error = %e, "batch could not run");
            serde_json::json!({
                "id": null,
                "method": "cleanComplete",
                "result": {
                    "status": "error",
                    "message": e.to_string(),
                    "elapsed_ms": result.elapsed_ms
                }
            })
        }
    }
}

/// Handle Cancel request - jobs not yet started are skipped
pub fn handle_cancel(state: &mut ServerState, id: Option<serde_json::Value>) -> Response {
    if !state.running {
        return Response::success(id, serde_json::json!({ "status": "idle" }));
    }
    state.request_cancel();
    info!("cancellation requested");
    Response::success(id, serde_json::json!({ "status": "cancelling" }))
}

/// Handle SetConfig request - updates only the fields given
pub fn handle_set_config(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct SetConfigParams {
        #[serde(default)]
        max_tries: Option<usize>,
        #[serde(default)]
        output: Option<OutputKind>,
        #[serde(default)]
        threads: Option<usize>,
        #[serde(default)]
        max_grid_lines: Option<usize>,
    }

    let params: SetConfigParams = match params.and_then(|p| serde_json::from_value(p).ok()) {
        Some(p) => p,
        None => return invalid_params(id, "{max_tries?: int, output?: string, threads?: int, max_grid_lines?: int}"),
    };

    if let Some(max_tries) = params.max_tries {
        state.config.max_tries = max_tries;
    }
    if let Some(output) = params.output {
        state.config.output = output;
    }
    if let Some(threads) = params.threads {
        // Zero means one thread per core
        state.config.threads = (threads > 0).then_some(threads);
    }
    if let Some(max_grid_lines) = params.max_grid_lines {
        state.config.max_grid_lines = max_grid_lines;
    }

    Response::success(id, serde_json::to_value(&state.config).unwrap_or(serde_json::Value::Null))
}

/// Handle Shutdown request
pub fn handle_shutdown(state: &mut ServerState, id: Option<serde_json::Value>) -> Response {
    state.shutdown_requested = true;
    if state.running {
        state.request_cancel();
    }
    Response::success(id, serde_json::json!({ "status": "ok" }))
}
