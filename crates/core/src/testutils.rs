use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde_json::json;

use crate::auth::{Clock, ConfigSource};
use crate::error::HttpError;
use crate::http::{HttpClient, HttpRequest, HttpResponse};

const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        *self.now.lock().unwrap() += TimeDelta::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Replays queued responses in order and records every request it sees.
///
/// A gate holds back any request carrying a header whose value equals the
/// marker until the test releases it. Responses are popped after the gate, so
/// requests that overtake a gated one consume the earlier queue entries.
pub struct ScriptedHttp {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
    gate: Option<Gate>,
}

struct Gate {
    marker: String,
    release: Mutex<Receiver<()>>,
    arrived_tx: Mutex<Sender<()>>,
    arrived_rx: Mutex<Receiver<()>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
            gate: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_gate(mut self, marker: &str, release: Receiver<()>) -> Self {
        let (arrived_tx, arrived_rx) = mpsc::channel();
        self.gate = Some(Gate {
            marker: marker.to_string(),
            release: Mutex::new(release),
            arrived_tx: Mutex::new(arrived_tx),
            arrived_rx: Mutex::new(arrived_rx),
        });
        self
    }

    pub fn push(&self, response: Result<HttpResponse, HttpError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(Ok(HttpResponse::new(status, body.to_string())));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Blocks until a gated request has reached the gate.
    pub fn wait_for_gated(&self) {
        let gate = self.gate.as_ref().expect("no gate configured");
        gate.arrived_rx
            .lock()
            .unwrap()
            .recv_timeout(GATE_TIMEOUT)
            .expect("gated request never arrived");
    }
}

impl HttpClient for ScriptedHttp {
    fn request(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            if request.headers.values().any(|v| *v == gate.marker) {
                gate.arrived_tx.lock().unwrap().send(()).unwrap();
                gate.release
                    .lock()
                    .unwrap()
                    .recv_timeout(GATE_TIMEOUT)
                    .expect("gate was never released");
            }
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::Other("no scripted response".to_string())))
    }
}

pub fn token_response(token: &str, expires_in: Option<i64>) -> Result<HttpResponse, HttpError> {
    let mut body = json!({ "access_token": token, "token_type": "bearer" });
    if let Some(secs) = expires_in {
        body["expires_in"] = json!(secs);
    }
    Ok(HttpResponse::new(200, body.to_string()))
}

/// Config source whose values can change after it is handed out.
pub struct MutableSource {
    values: Mutex<HashMap<String, String>>,
}

impl MutableSource {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

impl ConfigSource for MutableSource {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap();
        ConfigSource::get(&*values, key)
    }

    fn keys(&self) -> Vec<String> {
        self.values.lock().unwrap().keys().cloned().collect()
    }
}
