// Request routing and job flow through the cleaner server
use std::sync::mpsc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};

use slcleaner::job::JobResult;
use slcleaner::server::handlers::handle_run_complete;
use slcleaner::server::{dispatch_line, error_codes, RunAsyncResult, ServerState};

const BOX_RECORD: [i32; 16] = [1, 0, 0, 100, 0, 100, 10, 10, 0, 0, 0, 100, 100, 100, 100, 0];

fn call(state: &mut ServerState, tx: &mpsc::Sender<RunAsyncResult>, request: Value) -> Value {
    let line = dispatch_line(state, &request.to_string(), tx);
    serde_json::from_str(&line).expect("response is not JSON")
}

fn error_code(response: &Value) -> i64 {
    response["error"]["code"].as_i64().expect("expected an error response")
}

#[test]
fn test_clean_returns_polygons() {
    let mut state = ServerState::new();
    let (tx, _rx) = mpsc::channel();

    let response = call(&mut state, &tx, json!({"id": 1, "method": "Clean", "params": {"record": BOX_RECORD}}));
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["output"]["kind"], "polygons");
    assert_eq!(response["result"]["output"]["data"].as_array().unwrap().len(), 1);
    assert!(state.results.contains_key(&(1, 0)));
}

#[test]
fn test_set_config_switches_output() {
    let mut state = ServerState::new();
    let (tx, _rx) = mpsc::channel();

    let response = call(&mut state, &tx, json!({"id": 1, "method": "SetConfig", "params": {"output": "lines", "max_tries": 4}}));
    assert_eq!(response["result"]["output"], "lines");
    assert_eq!(response["result"]["max_tries"], 4);

    let response = call(&mut state, &tx, json!({"id": 2, "method": "Clean", "params": {"record": BOX_RECORD}}));
    assert_eq!(response["result"]["output"]["kind"], "lines");
}

#[test]
fn test_protocol_errors() {
    let mut state = ServerState::new();
    let (tx, _rx) = mpsc::channel();

    let response = call(&mut state, &tx, json!({"id": 1, "method": "Frobnicate"}));
    assert_eq!(error_code(&response), i64::from(error_codes::METHOD_NOT_FOUND));

    let response = call(&mut state, &tx, json!({"id": 2, "method": "Clean", "params": {"wrong": true}}));
    assert_eq!(error_code(&response), i64::from(error_codes::INVALID_PARAMS));

    let response = call(&mut state, &tx, json!({"id": 3, "method": "Clean", "params": {"record": [1, 0, 0]}}));
    assert_eq!(error_code(&response), i64::from(error_codes::INVALID_PARAMS));

    let out_of_bounds = [1, 0, 0, 100, 0, 100, 10, 10, 500, 500, 0, 10];
    let response = call(&mut state, &tx, json!({"id": 4, "method": "Clean", "params": {"record": out_of_bounds}}));
    assert_eq!(error_code(&response), i64::from(error_codes::JOB_FAILED));

    let response = call(&mut state, &tx, json!({"id": 5, "method": "Run"}));
    assert_eq!(error_code(&response), i64::from(error_codes::NOTHING_QUEUED));

    let response = call(&mut state, &tx, json!({"id": 6, "method": "GetResult", "params": {"layer": 9}}));
    assert_eq!(error_code(&response), i64::from(error_codes::RESULT_NOT_FOUND));

    let line = dispatch_line(&mut state, "{not json", &tx);
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(error_code(&response), i64::from(error_codes::PARSE_ERROR));
}

#[test]
fn test_oversized_extent_is_a_job_failure() {
    let mut state = ServerState::new();
    let (tx, _rx) = mpsc::channel();

    call(&mut state, &tx, json!({"id": 1, "method": "Clean", "params": {"record": BOX_RECORD}}));

    let huge = [1, 1, 0, 2_000_000_000, 0, 2_000_000_000, 10, 10];
    let response = call(&mut state, &tx, json!({"id": 2, "method": "Clean", "params": {"record": huge}}));
    assert_eq!(error_code(&response), i64::from(error_codes::JOB_FAILED));
    assert!(response["error"]["message"].as_str().unwrap().contains("limit"));

    call(&mut state, &tx, json!({"id": 3, "method": "SetConfig", "params": {"max_grid_lines": 50}}));
    let response = call(&mut state, &tx, json!({"id": 4, "method": "Clean", "params": {"record": BOX_RECORD}}));
    assert_eq!(error_code(&response), i64::from(error_codes::JOB_FAILED));

    // Earlier results survive
    assert!(state.results.contains_key(&(1, 0)));
    assert!(!state.results.contains_key(&(1, 1)));
}

#[test]
fn test_background_batch_and_binary_result() {
    let mut state = ServerState::new();
    let (tx, rx) = mpsc::channel();

    let mut second = BOX_RECORD;
    second[0] = 2;
    let mut bad = BOX_RECORD.to_vec();
    bad[0] = 3;
    bad.extend_from_slice(&[0, 0, 0, 900]);

    let response = call(&mut state, &tx, json!({"id": 1, "method": "Submit", "params": {"records": [BOX_RECORD, second, bad]}}));
    assert_eq!(response["result"]["queued"], 3);

    let response = call(&mut state, &tx, json!({"id": 2, "method": "Run"}));
    assert_eq!(response["result"]["status"], "started");
    assert!(state.queue.is_empty());

    let response = call(&mut state, &tx, json!({"id": 3, "method": "Run"}));
    assert_eq!(error_code(&response), i64::from(error_codes::RUN_IN_PROGRESS));

    let finished = rx.recv_timeout(Duration::from_secs(30)).expect("batch did not finish");
    let notification = handle_run_complete(&mut state, finished);
    assert_eq!(notification["method"], "cleanComplete");
    assert_eq!(notification["result"]["succeeded"], 2);
    assert_eq!(notification["result"]["failed"], 1);
    assert!(!state.running);

    let listing = call(&mut state, &tx, json!({"id": 4, "method": "ListResults"}));
    assert_eq!(listing["result"]["results"].as_array().unwrap().len(), 2);
    assert_eq!(listing["result"]["failures"][0]["layer"], 3);

    let line = dispatch_line(
        &mut state,
        &json!({"id": 9, "method": "GetResultBinary", "params": {"layer": 2, "datatype": 0}}).to_string(),
        &tx,
    );
    let payload = line.strip_prefix("BINARY:9:").expect("binary framing");
    let bytes = BASE64.decode(payload).unwrap();
    let decoded: JobResult = rmp_serde::from_slice(&bytes).unwrap();
    assert_eq!(&decoded, &state.results[&(2, 0)]);
}

#[test]
fn test_cancel_and_shutdown() {
    let mut state = ServerState::new();
    let (tx, _rx) = mpsc::channel();

    let response = call(&mut state, &tx, json!({"id": 1, "method": "Cancel"}));
    assert_eq!(response["result"]["status"], "idle");

    let response = call(&mut state, &tx, json!({"id": 2, "method": "Shutdown"}));
    assert_eq!(response["result"]["status"], "ok");
    assert!(state.shutdown_requested);
}
