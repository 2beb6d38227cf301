//! Result handlers: GetResult, GetResultBinary, ListResults

use serde::Deserialize;
use tracing::debug;

use crate::job::JobResult;
use crate::server::protocol::{binary_line, error_codes, Response};
use crate::server::state::ServerState;

#[derive(Deserialize)]
struct ResultParams {
    layer: i32,
    #[serde(default)]
    datatype: i32,
}

fn lookup<'a>(
    state: &'a ServerState,
    id: &Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Result<&'a JobResult, Response> {
    let params: ResultParams = params
        .and_then(|p| serde_json::from_value(p).ok())
        .ok_or_else(|| {
            Response::error(
                id.clone(),
                error_codes::INVALID_PARAMS,
                "Invalid params: expected {layer: int, datatype?: int}".to_string(),
            )
        })?;

    state.results.get(&(params.layer, params.datatype)).ok_or_else(|| {
        Response::error(
            id.clone(),
            error_codes::RESULT_NOT_FOUND,
            format!("No result for layer {} datatype {}", params.layer, params.datatype),
        )
    })
}

/// Handle GetResult request - returns one stored result as JSON
pub fn handle_get_result(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    match lookup(state, &id, params) {
        Ok(result) => Response::success(id, serde_json::to_value(result).unwrap_or(serde_json::Value::Null)),
        Err(response) => response,
    }
}

/// Handle GetResultBinary request - MessagePack result framed as a binary line
pub fn handle_get_result_binary(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> String {
    let result = match lookup(state, &id, params) {
        Ok(result) => result,
        Err(response) => return response.to_line(),
    };

    match rmp_serde::to_vec_named(result) {
        Ok(data) => {
            debug!(layer = result.layer, datatype = result.datatype, bytes = data.len(), "binary result");
            binary_line(&id, &data)
        }
        Err(e) => Response::error(id, error_codes::ENCODE_FAILED, format!("Failed to encode result: {}", e)).to_line(),
    }
}

/// Handle ListResults request - summary of stored results and the last batch's failures
pub fn handle_list_results(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    let results: Vec<serde_json::Value> = state
        .results
        .values()
        .map(|r| {
            serde_json::json!({
                "layer": r.layer,
                "datatype": r.datatype,
                "outputs": r.output.len(),
                "fixed": r.report.as_ref().map_or(0, |report| report.total_fixed()),
                "complete": r.report.as_ref().map_or(true, |report| report.is_complete()),
                "elapsed_ms": r.elapsed_ms
            })
        })
        .collect();

    Response::success(id, serde_json::json!({
        "running": state.running,
        "queued": state.queue.len(),
        "results": results,
        "failures": &state.failures
    }))
}
