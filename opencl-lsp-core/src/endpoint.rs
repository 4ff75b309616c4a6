//! Component C — the JSON-RPC framing/dispatch state machine.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::header::parse_header_line;
use crate::jsonrpc::{error_response, id_of, method_of, ErrorCode, RpcError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    ReadingHeaders,
    ReadingBody,
}

type MethodHandler = Box<dyn FnMut(&Endpoint, Value) + Send>;
type ResponseHandler = Box<dyn FnMut(Value) + Send>;
type OutputSink = Box<dyn FnMut(&[u8]) + Send>;

struct State {
    initialized: bool,
    tracing: bool,
    verbose_tracing: bool,
    phase: Phase,
    line_buffer: Vec<u8>,
    content_length: Option<usize>,
    body_buffer: Vec<u8>,
    busy: bool,
    method_handlers: HashMap<String, MethodHandler>,
    response_handler: Option<ResponseHandler>,
    output_sink: Option<OutputSink>,
}

impl State {
    fn new() -> Self {
        State {
            initialized: false,
            tracing: false,
            verbose_tracing: false,
            phase: Phase::ReadingHeaders,
            line_buffer: Vec::new(),
            content_length: None,
            body_buffer: Vec::new(),
            busy: false,
            method_handlers: HashMap::new(),
            response_handler: None,
            output_sink: None,
        }
    }

    fn clear_framing(&mut self) {
        self.line_buffer.clear();
        self.body_buffer.clear();
        self.content_length = None;
        self.phase = Phase::ReadingHeaders;
    }

    /// Serialize `body` with `Content-Length`/`Content-Type` headers and hand it to the
    /// output sink. `jsonrpc` is merged in when the caller's object is missing it.
    fn frame_and_emit(&mut self, mut body: Value) {
        if let Value::Object(ref mut map) = body {
            map.entry("jsonrpc").or_insert_with(|| Value::from("2.0"));
        }
        let payload = serde_json::to_vec(&body).expect("jsonrpc body is always serializable");
        let mut framed = Vec::with_capacity(payload.len() + 80);
        framed.extend_from_slice(
            format!(
                "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc;charset=utf-8\r\n\r\n",
                payload.len()
            )
            .as_bytes(),
        );
        framed.extend_from_slice(&payload);

        match self.output_sink.as_mut() {
            Some(sink) => sink(&framed),
            None => log::warn!("no output sink registered; dropping outbound message"),
        }
    }
}

/// The framing/dispatch state machine. Cheap to clone — clones share the same
/// underlying state, which is how a method handler can call back into `write` (or
/// register further handlers) without deadlocking the byte pump that's driving
/// `consume`.
#[derive(Clone)]
pub struct Endpoint(Arc<Mutex<State>>);

impl Endpoint {
    pub fn new() -> Self {
        Endpoint(Arc::new(Mutex::new(State::new())))
    }

    pub fn register_method(
        &self,
        name: impl Into<String>,
        handler: impl FnMut(&Endpoint, Value) + Send + 'static,
    ) {
        let mut state = self.0.lock();
        state.method_handlers.insert(name.into(), Box::new(handler));
    }

    pub fn register_response_handler(&self, handler: impl FnMut(Value) + Send + 'static) {
        let mut state = self.0.lock();
        state.response_handler = Some(Box::new(handler));
    }

    pub fn register_output(&self, sink: impl FnMut(&[u8]) + Send + 'static) {
        let mut state = self.0.lock();
        state.output_sink = Some(Box::new(sink));
    }

    pub fn is_ready(&self) -> bool {
        !self.0.lock().busy
    }

    /// Clear per-message framing state, preserving `initialized`/`tracing` and every
    /// registered handler. Exposed for callers that need to recover a wedged endpoint
    /// (e.g. after an I/O error on the byte pump's side); `consume` manages this
    /// internally in the ordinary case and callers do not need to invoke it themselves.
    pub fn reset(&self) {
        let mut state = self.0.lock();
        state.clear_framing();
        state.busy = true;
    }

    pub fn write(&self, json: Value) {
        let mut state = self.0.lock();
        state.frame_and_emit(json);
    }

    pub fn log_trace(&self, message: &str, verbose: Option<&str>) {
        let mut state = self.0.lock();
        if !state.tracing {
            return;
        }
        let mut params = serde_json::json!({ "message": message });
        if state.verbose_tracing {
            if let Some(verbose) = verbose {
                params["verbose"] = Value::from(verbose);
            }
        }
        state.frame_and_emit(serde_json::json!({
            "jsonrpc": "2.0",
            "method": "$/logTrace",
            "params": params,
        }));
    }

    /// Feed one byte of the input stream. Never blocks; never panics across this
    /// boundary. May synchronously invoke the output sink and/or a method handler.
    pub fn consume(&self, byte: u8) {
        let ready = {
            let mut state = self.0.lock();
            state.feed_byte(byte)
        };
        if let Some(value) = ready {
            self.dispatch(value);
        }
    }

    /// `consume` applied to every byte of `bytes` in order — feeding a message in
    /// arbitrary chunk sizes is observationally identical to feeding it one byte at a
    /// time, since this is exactly how `consume` is defined to behave in bulk.
    pub fn consume_bytes(&self, bytes: &[u8]) {
        for byte in bytes {
            self.consume(*byte);
        }
    }

    fn dispatch(&self, value: Value) {
        match method_of(&value) {
            Some(method) => self.dispatch_method(method.to_string(), value),
            None => self.dispatch_response(value),
        }
    }

    fn dispatch_method(&self, method: String, value: Value) {
        let id = id_of(&value);
        let handler = {
            let mut state = self.0.lock();

            if method == "initialize" {
                let trace = value
                    .pointer("/params/trace")
                    .and_then(Value::as_str)
                    .unwrap_or("off");
                state.tracing = trace != "off";
                state.verbose_tracing = trace == "verbose";
                state.initialized = true;
            } else if !state.initialized {
                let error = RpcError::new(
                    ErrorCode::NotInitialized,
                    format!("server not initialized: {method}"),
                );
                state.frame_and_emit(error_response(id, &error));
                state.busy = false;
                return;
            } else if method == "$/setTrace" {
                let trace = value
                    .pointer("/params/value")
                    .and_then(Value::as_str)
                    .unwrap_or("off");
                state.tracing = trace != "off";
                state.verbose_tracing = trace == "verbose";
            }

            match state.method_handlers.remove(&method) {
                Some(handler) => handler,
                None => {
                    let response_required = id.is_some() || !method.starts_with("$/");
                    if response_required {
                        let error = RpcError::new(
                            ErrorCode::MethodNotFound,
                            format!("method not found: {method}"),
                        );
                        state.frame_and_emit(error_response(id, &error));
                    }
                    state.busy = false;
                    return;
                }
            }
        };

        self.invoke_method_handler(method, handler, value);
    }

    /// Runs `handler` with the state lock released, so the handler can call back into
    /// `write`/`register_method`/etc. A panicking handler is caught and logged; the
    /// endpoint stays alive and `busy` is still cleared.
    fn invoke_method_handler(&self, method: String, mut handler: MethodHandler, value: Value) {
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(self, value)));
        if let Err(payload) = outcome {
            log::error!(
                "method handler for '{method}' panicked: {}",
                describe_panic(&payload)
            );
        }

        let mut state = self.0.lock();
        state.method_handlers.insert(method, handler);
        state.busy = false;
    }

    fn dispatch_response(&self, value: Value) {
        let handler = {
            let mut state = self.0.lock();
            state.response_handler.take()
        };

        let Some(mut handler) = handler else {
            let mut state = self.0.lock();
            state.busy = false;
            return;
        };

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(value)));
        if let Err(payload) = outcome {
            log::error!("response handler panicked: {}", describe_panic(&payload));
        }

        let mut state = self.0.lock();
        state.response_handler = Some(handler);
        state.busy = false;
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new()
    }
}

impl State {
    /// Advance the framing state machine by one byte. Returns the parsed body once a
    /// complete message has arrived, for the caller to dispatch outside the lock.
    fn feed_byte(&mut self, byte: u8) -> Option<Value> {
        match self.phase {
            Phase::ReadingHeaders => self.feed_header_byte(byte),
            Phase::ReadingBody => self.feed_body_byte(byte),
        }
    }

    fn feed_header_byte(&mut self, byte: u8) -> Option<Value> {
        self.line_buffer.push(byte);
        if !self.line_buffer.ends_with(b"\r\n") {
            return None;
        }

        let line_bytes = {
            let end = self.line_buffer.len() - 2;
            self.line_buffer[..end].to_vec()
        };
        self.line_buffer.clear();
        let line = String::from_utf8_lossy(&line_bytes);

        if line.is_empty() {
            // Blank line terminates the header block.
            match self.content_length {
                Some(n) if n > 0 => {
                    self.phase = Phase::ReadingBody;
                    self.body_buffer = Vec::with_capacity(n);
                }
                _ => {
                    let error =
                        RpcError::new(ErrorCode::InvalidRequest, "invalid content length");
                    self.frame_and_emit(error_response(None, &error));
                    self.clear_framing();
                }
            }
            return None;
        }

        if let Some((name, value)) = parse_header_line(&line) {
            if name == "Content-Length" {
                self.content_length = value.parse::<usize>().ok();
            }
        }
        None
    }

    fn feed_body_byte(&mut self, byte: u8) -> Option<Value> {
        self.body_buffer.push(byte);
        let content_length = self.content_length.expect("ReadingBody implies a known length");
        if self.body_buffer.len() < content_length {
            return None;
        }

        let raw = std::mem::take(&mut self.body_buffer);
        self.clear_framing();
        self.busy = true;

        match serde_json::from_slice::<Value>(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("dropping message: invalid JSON body ({err})");
                let error = RpcError::new(ErrorCode::ParseError, "invalid JSON in message body");
                self.frame_and_emit(error_response(None, &error));
                self.busy = false;
                None
            }
        }
    }
}

fn describe_panic(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn frame(body: &Value) -> Vec<u8> {
        let payload = serde_json::to_vec(body).unwrap();
        let mut out = format!("Content-Length: {}\r\n\r\n", payload.len()).into_bytes();
        out.extend_from_slice(&payload);
        out
    }

    fn endpoint_with_sink() -> (Endpoint, Arc<StdMutex<Vec<Value>>>) {
        let endpoint = Endpoint::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let sink_received = received.clone();
        endpoint.register_output(move |bytes| {
            let text = std::str::from_utf8(bytes).unwrap();
            let body_start = text.find("\r\n\r\n").unwrap() + 4;
            let value: Value = serde_json::from_str(&text[body_start..]).unwrap();
            sink_received.lock().unwrap().push(value);
        });
        (endpoint, received)
    }

    fn initialize(endpoint: &Endpoint, trace: &str) {
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": { "trace": trace },
        });
        endpoint.consume_bytes(&frame(&req));
    }

    #[test]
    fn registered_handler_is_invoked_and_can_write_back() {
        let (endpoint, received) = endpoint_with_sink();
        initialize(&endpoint, "off");

        let calls = Arc::new(StdMutex::new(0));
        let calls_clone = calls.clone();
        endpoint.register_method("textDocument/didOpen", move |ep, _value| {
            *calls_clone.lock().unwrap() += 1;
            ep.write(serde_json::json!({
                "method": "textDocument/publishDiagnostics",
                "params": { "diagnostics": [] },
            }));
        });

        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didOpen",
            "params": { "textDocument": { "uri": "file:///a.cl" } },
        });
        endpoint.consume_bytes(&frame(&req));

        assert_eq!(*calls.lock().unwrap(), 1);
        let outputs = received.lock().unwrap();
        assert_eq!(outputs.last().unwrap()["method"], "textDocument/publishDiagnostics");
        assert!(endpoint.is_ready());
    }

    #[test]
    fn byte_at_a_time_matches_bulk_feed() {
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": { "trace": "off" },
        });
        let framed = frame(&req);

        let (bulk_endpoint, bulk_received) = endpoint_with_sink();
        bulk_endpoint.consume_bytes(&framed);

        let (byte_endpoint, byte_received) = endpoint_with_sink();
        for byte in &framed {
            byte_endpoint.consume(*byte);
        }

        assert_eq!(*bulk_received.lock().unwrap(), *byte_received.lock().unwrap());
    }

    #[test]
    fn a_panicking_handler_does_not_wedge_the_endpoint() {
        let (endpoint, received) = endpoint_with_sink();
        initialize(&endpoint, "off");

        endpoint.register_method("opencl/boom", |_ep, _value| {
            panic!("synthetic handler failure");
        });

        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "opencl/boom",
            "params": {},
        });
        endpoint.consume_bytes(&frame(&req));

        assert!(endpoint.is_ready());

        // The endpoint is still usable afterward.
        let calls = Arc::new(StdMutex::new(0));
        let calls_clone = calls.clone();
        endpoint.register_method("textDocument/didOpen", move |_ep, _value| {
            *calls_clone.lock().unwrap() += 1;
        });
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didOpen",
            "params": {},
        });
        endpoint.consume_bytes(&frame(&req));
        assert_eq!(*calls.lock().unwrap(), 1);
        let _ = received.lock().unwrap();
    }
}
