//! Cleaner server - JSON-RPC over stdio
//!
//! One request per input line, one response per output line. Batches run on
//! a background thread and announce themselves with a `cleanComplete`
//! notification once finished.
//!
//! # Module Structure
//! - `protocol` - JSON-RPC request/response types
//! - `state` - Queue, stored results and batch bookkeeping
//! - `handlers` - Request handlers organized by functionality

pub mod handlers;
pub mod protocol;
pub mod state;

use std::sync::mpsc::Sender;

// Re-export key types for convenience
pub use protocol::{error_codes, ErrorResponse, Request, Response};
pub use state::{FailureSummary, RunAsyncResult, ServerState};

use handlers::*;

/// Route one request to its handler and return the output line
pub fn dispatch(state: &mut ServerState, request: Request, tx: &Sender<RunAsyncResult>) -> String {
    match request.method.as_str() {
        "Clean" => handle_clean(state, request.id, request.params).to_line(),
        "Submit" => handle_submit(state, request.id, request.params).to_line(),
        "Run" => handle_run_async(state, request.id, tx).to_line(),
        "Cancel" => handle_cancel(state, request.id).to_line(),
        "GetResult" => handle_get_result(state, request.id, request.params).to_line(),
        "GetResultBinary" => handle_get_result_binary(state, request.id, request.params),
        "ListResults" => handle_list_results(state, request.id).to_line(),
        "SetConfig" => handle_set_config(state, request.id, request.params).to_line(),
        "Shutdown" => handle_shutdown(state, request.id).to_line(),
        _ => Response::error(
            request.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        )
        .to_line(),
    }
}

/// Parse and route a raw input line
pub fn dispatch_line(state: &mut ServerState, line: &str, tx: &Sender<RunAsyncResult>) -> String {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => dispatch(state, request, tx),
        Err(e) => Response::error(None, error_codes::PARSE_ERROR, format!("Failed to parse request: {}", e)).to_line(),
    }
}
