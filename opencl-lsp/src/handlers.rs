//! Component D — LSP method handlers bridging wire methods into the Diagnostics Engine
//! and the document store. A thin collaborator layer, not part of the core library.

use std::sync::Arc;

use lsp_types::Url;
use opencl_lsp_core::jsonrpc::{id_of, Id};
use opencl_lsp_core::{DiagnosticsEngine, Endpoint, SourceJob};
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::{InitializationOptions, ServerConfig};
use crate::document_store::DocumentStore;

struct GlueState {
    documents: DocumentStore,
    config: ServerConfig,
    engine: DiagnosticsEngine,
    shutdown_requested: bool,
}

/// Register every method this server understands onto `endpoint`. `engine` starts with
/// no device selected; `initialize` performs the first selection.
pub fn register_handlers(endpoint: &Endpoint, engine: DiagnosticsEngine) {
    let state = Arc::new(Mutex::new(GlueState {
        documents: DocumentStore::new(),
        config: ServerConfig::default(),
        engine,
        shutdown_requested: false,
    }));

    register(endpoint, &state, "initialize", handle_initialize);
    register(endpoint, &state, "initialized", handle_initialized);
    register(endpoint, &state, "textDocument/didOpen", handle_did_open);
    register(endpoint, &state, "textDocument/didChange", handle_did_change);
    register(endpoint, &state, "textDocument/didClose", handle_did_close);
    register(endpoint, &state, "opencl/revalidate", handle_revalidate);
    register(endpoint, &state, "shutdown", handle_shutdown);
    register(endpoint, &state, "exit", handle_exit);
}

fn register(
    endpoint: &Endpoint,
    state: &Arc<Mutex<GlueState>>,
    method: &str,
    handler: fn(&Arc<Mutex<GlueState>>, &Endpoint, Value),
) {
    let state = state.clone();
    endpoint.register_method(method, move |ep, value| handler(&state, ep, value));
}

fn respond(ep: &Endpoint, id: Option<Id>, result: Value) {
    let mut body = serde_json::json!({ "jsonrpc": "2.0", "result": result });
    if let Some(id) = id {
        body["id"] = Value::from(id);
    }
    ep.write(body);
}

fn handle_initialize(state: &Arc<Mutex<GlueState>>, ep: &Endpoint, value: Value) {
    let id = id_of(&value);
    let options: InitializationOptions = value
        .pointer("/params/initializationOptions")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let mut state = state.lock();
    state.config.apply(options);
    let build_options: Vec<Value> = state
        .config
        .build_options
        .iter()
        .map(|s| Value::from(s.clone()))
        .collect();
    state.engine.set_build_options(&build_options);
    state.engine.set_max_problems(state.config.max_problems);

    if let Err(err) = state.engine.set_device(state.config.device_id) {
        log::error!("OpenCL device selection failed: {err}");
    }

    respond(
        ep,
        id,
        serde_json::json!({
            "capabilities": {
                "textDocumentSync": 1,
            }
        }),
    );
}

fn handle_initialized(_state: &Arc<Mutex<GlueState>>, _ep: &Endpoint, _value: Value) {
    log::info!("client acknowledged initialization");
}

fn handle_did_open(state: &Arc<Mutex<GlueState>>, ep: &Endpoint, value: Value) {
    let Some(uri) = text_document_uri(&value) else {
        return;
    };
    let Some(text) = value.pointer("/params/textDocument/text").and_then(Value::as_str) else {
        return;
    };

    let mut state = state.lock();
    state.documents.open(uri.clone(), text.to_string());
    validate_and_publish(&mut state, ep, &uri);
}

fn handle_did_change(state: &Arc<Mutex<GlueState>>, ep: &Endpoint, value: Value) {
    let Some(uri) = text_document_uri(&value) else {
        return;
    };
    // Full-document sync: the last entry in `contentChanges` carries the whole text.
    let Some(text) = value
        .pointer("/params/contentChanges")
        .and_then(Value::as_array)
        .and_then(|changes| changes.last())
        .and_then(|change| change.get("text"))
        .and_then(Value::as_str)
    else {
        return;
    };

    let mut state = state.lock();
    state.documents.update(&uri, text.to_string());
    validate_and_publish(&mut state, ep, &uri);
}

fn handle_did_close(state: &Arc<Mutex<GlueState>>, ep: &Endpoint, value: Value) {
    let Some(uri) = text_document_uri(&value) else {
        return;
    };

    let mut state = state.lock();
    state.documents.close(&uri);
    publish_diagnostics(ep, &uri, Vec::new());
}

fn handle_revalidate(state: &Arc<Mutex<GlueState>>, ep: &Endpoint, value: Value) {
    let Some(uri) = value
        .pointer("/params/uri")
        .and_then(Value::as_str)
        .and_then(|s| Url::parse(s).ok())
    else {
        return;
    };

    let mut state = state.lock();
    validate_and_publish(&mut state, ep, &uri);
}

fn handle_shutdown(state: &Arc<Mutex<GlueState>>, ep: &Endpoint, value: Value) {
    let id = id_of(&value);
    state.lock().shutdown_requested = true;
    respond(ep, id, Value::Null);
}

fn handle_exit(state: &Arc<Mutex<GlueState>>, _ep: &Endpoint, _value: Value) {
    let clean = state.lock().shutdown_requested;
    std::process::exit(if clean { 0 } else { 1 });
}

fn text_document_uri(value: &Value) -> Option<Url> {
    value
        .pointer("/params/textDocument/uri")
        .and_then(Value::as_str)
        .and_then(|s| Url::parse(s).ok())
}

fn validate_and_publish(state: &mut GlueState, ep: &Endpoint, uri: &Url) {
    let Some(text) = state.documents.get(uri) else {
        return;
    };

    let job = match uri.to_file_path() {
        Ok(path) => SourceJob::new(text.to_string())
            .with_file_path(path.to_string_lossy().into_owned()),
        Err(()) => SourceJob::new(text.to_string()),
    };

    let diagnostics = match state.engine.get(&job) {
        Ok(diagnostics) => diagnostics,
        Err(err) => {
            log::error!("diagnostics failed for {uri}: {err}");
            Vec::new()
        }
    };

    publish_diagnostics(ep, uri, diagnostics);
}

fn publish_diagnostics(ep: &Endpoint, uri: &Url, diagnostics: Vec<lsp_types::Diagnostic>) {
    ep.write(serde_json::json!({
        "jsonrpc": "2.0",
        "method": "textDocument/publishDiagnostics",
        "params": {
            "uri": uri,
            "diagnostics": diagnostics,
        }
    }));
}
