//! In-process mock of the etcd v3 JSON gateway.
//!
//! Runs an axum server on a random local port and answers the gateway
//! endpoints from an in-memory keyspace, lease table and auth store, in the
//! same JSON shapes the real gateway produces: int64 fields as strings,
//! binary fields base64-encoded, empty fields omitted, keepalive wrapped in
//! `result`. Every request is recorded so tests can assert on what went over
//! the wire.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use base64::prelude::*;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use etcd_gateway::Config;

const VERSION_PREFIX: &str = "/v3/";

/// A request as the mock received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Path relative to `/v3/`, e.g. `kv/put`.
    pub path: String,
    pub token: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone)]
struct StoredKv {
    value: Vec<u8>,
    create_revision: i64,
    mod_revision: i64,
    version: i64,
    lease: i64,
}

#[derive(Debug, Clone)]
struct StoredPerm {
    perm_type: i64,
    key: String,
    range_end: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    revision: i64,
    kv: BTreeMap<Vec<u8>, StoredKv>,
    next_lease: i64,
    leases: BTreeMap<i64, i64>,
    auth_enabled: bool,
    issued_tokens: Vec<String>,
    roles: BTreeMap<String, Vec<StoredPerm>>,
    users: BTreeMap<String, (String, Vec<String>)>,
    overrides: HashMap<String, (StatusCode, String)>,
    delays: HashMap<String, Duration>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<MockState>>;

/// In-process mock etcd gateway for testing.
pub struct MockGateway {
    state: Shared,
    /// Server handle (kept alive to prevent shutdown)
    _handle: JoinHandle<()>,
    addr: SocketAddr,
}

impl MockGateway {
    /// Create and start a mock gateway on a random available port.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState {
            revision: 1,
            next_lease: 7587851264367820800,
            ..MockState::default()
        }));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock gateway");
        let addr = listener.local_addr().expect("Failed to get local address");

        let app = Router::new().fallback(handle).with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock gateway failed");
        });

        Self {
            state,
            _handle: handle,
            addr,
        }
    }

    /// Client configuration pointing at this mock.
    pub fn config(&self, pretty: bool) -> Config {
        Config::default()
            .with_host(self.addr.ip().to_string())
            .with_port(self.addr.port())
            .with_pretty(pretty)
            .with_timeout_secs(5)
    }

    /// Answer `path` with a fixed status and raw body instead of emulating it.
    pub async fn respond_with(&self, path: &str, status: StatusCode, body: &str) {
        self.state
            .lock()
            .await
            .overrides
            .insert(path.to_string(), (status, body.to_string()));
    }

    /// Hold every reply on `path` for `delay` before answering.
    pub async fn delay(&self, path: &str, delay: Duration) {
        self.state
            .lock()
            .await
            .delays
            .insert(path.to_string(), delay);
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().await.requests.clone()
    }

    pub async fn last_request(&self) -> RecordedRequest {
        self.requests()
            .await
            .pop()
            .expect("mock gateway received no requests")
    }

    /// Seed a user directly, bypassing the API.
    pub async fn seed_user(&self, name: &str, password: &str) {
        self.state
            .lock()
            .await
            .users
            .insert(name.to_string(), (password.to_string(), Vec::new()));
    }
}

async fn handle(State(shared): State<Shared>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let path = uri
        .path()
        .strip_prefix(VERSION_PREFIX)
        .unwrap_or(uri.path())
        .to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let token = headers
        .get("grpc-metadata-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut state = shared.lock().await;
    state.requests.push(RecordedRequest {
        path: path.clone(),
        token: token.clone(),
        content_type,
        body: body.clone(),
    });

    if let Some(delay) = state.delays.get(&path).copied() {
        drop(state);
        tokio::time::sleep(delay).await;
        state = shared.lock().await;
    }

    if let Some((status, raw)) = state.overrides.get(&path).cloned() {
        return (status, [(header::CONTENT_TYPE, "application/json")], raw).into_response();
    }

    if state.auth_enabled && path.starts_with("kv/") {
        let valid = token
            .as_ref()
            .is_some_and(|t| state.issued_tokens.contains(t));
        if !valid {
            return grpc_error(StatusCode::UNAUTHORIZED, 16, "etcdserver: invalid auth token");
        }
    }

    match state.dispatch(&path, &body) {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(response) => response,
    }
}

fn grpc_error(status: StatusCode, code: i64, message: &str) -> Response {
    (
        status,
        Json(json!({"error": message, "message": message, "code": code})),
    )
        .into_response()
}

fn b64(raw: &[u8]) -> String {
    BASE64_STANDARD.encode(raw)
}

fn bytes_field(body: &Value, name: &str) -> Vec<u8> {
    body.get(name)
        .and_then(Value::as_str)
        .and_then(|s| BASE64_STANDARD.decode(s).ok())
        .unwrap_or_default()
}

fn str_field(body: &Value, name: &str) -> String {
    body.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn int_field(body: &Value, name: &str) -> i64 {
    body.get(name)
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0)
}

fn bool_field(body: &Value, name: &str) -> bool {
    body.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn perm_type_name(code: i64) -> &'static str {
    match code {
        0 => "READ",
        1 => "WRITE",
        _ => "READWRITE",
    }
}

impl MockState {
    fn header(&self) -> Value {
        json!({
            "cluster_id": "14841639068965178418",
            "member_id": "10276657743932975437",
            "revision": self.revision.to_string(),
            "raft_term": "2"
        })
    }

    fn ok(&self) -> Value {
        json!({"header": self.header()})
    }

    fn kv_json(key: &[u8], kv: &StoredKv, keys_only: bool) -> Value {
        let mut record = json!({
            "key": b64(key),
            "create_revision": kv.create_revision.to_string(),
            "mod_revision": kv.mod_revision.to_string(),
            "version": kv.version.to_string(),
        });
        if !keys_only {
            record["value"] = json!(b64(&kv.value));
        }
        if kv.lease != 0 {
            record["lease"] = json!(kv.lease.to_string());
        }
        record
    }

    /// Keys selected by `key` and `range_end` per etcd range rules.
    fn select(&self, key: &[u8], range_end: &[u8]) -> Vec<Vec<u8>> {
        self.kv
            .keys()
            .filter(|k| {
                if range_end.is_empty() {
                    k.as_slice() == key
                } else if range_end == [0] {
                    k.as_slice() >= key
                } else {
                    k.as_slice() >= key && k.as_slice() < range_end
                }
            })
            .cloned()
            .collect()
    }

    fn dispatch(&mut self, path: &str, body: &Value) -> Result<Value, Response> {
        let reply = match path {
            "kv/put" => self.put(body),
            "kv/range" => self.range(body),
            "kv/deleterange" => self.delete_range(body),
            "kv/compaction" => self.ok(),
            "lease/grant" => self.lease_grant(body),
            "kv/lease/revoke" => {
                let id = int_field(body, "ID");
                self.leases.remove(&id);
                self.kv.retain(|_, kv| kv.lease != id);
                self.ok()
            }
            "lease/keepalive" => {
                let id = int_field(body, "ID");
                let ttl = self.leases.get(&id).copied().unwrap_or(0);
                json!({"result": {"header": self.header(), "ID": id.to_string(), "TTL": ttl.to_string()}})
            }
            "kv/lease/timetolive" => self.time_to_live(body),
            "auth/enable" => {
                self.auth_enabled = true;
                self.ok()
            }
            "auth/disable" => {
                self.auth_enabled = false;
                self.issued_tokens.clear();
                self.ok()
            }
            "auth/authenticate" => return self.authenticate(body),
            "auth/role/add" => {
                self.roles.entry(str_field(body, "name")).or_default();
                self.ok()
            }
            "auth/role/get" => self.role_get(body),
            "auth/role/delete" => {
                self.roles.remove(&str_field(body, "role"));
                self.ok()
            }
            "auth/role/list" => {
                let roles: Vec<&String> = self.roles.keys().collect();
                json!({"header": self.header(), "roles": roles})
            }
            "auth/role/grant" => {
                let perm = body.get("perm").cloned().unwrap_or(Value::Null);
                let stored = StoredPerm {
                    perm_type: int_field(&perm, "permType"),
                    key: str_field(&perm, "key"),
                    range_end: perm
                        .get("range_end")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                };
                self.roles
                    .entry(str_field(body, "name"))
                    .or_default()
                    .push(stored);
                self.ok()
            }
            "auth/role/revoke" => self.ok(),
            "auth/user/add" => {
                self.users.insert(
                    str_field(body, "name"),
                    (str_field(body, "password"), Vec::new()),
                );
                self.ok()
            }
            "auth/user/get" => {
                let mut reply = self.ok();
                if let Some((_, roles)) = self.users.get(&str_field(body, "name")) {
                    if !roles.is_empty() {
                        reply["roles"] = json!(roles);
                    }
                }
                reply
            }
            "auth/user/delete" => {
                self.users.remove(&str_field(body, "name"));
                self.ok()
            }
            "auth/user/list" => {
                let users: Vec<&String> = self.users.keys().collect();
                json!({"header": self.header(), "users": users})
            }
            "auth/user/changepw" => {
                if let Some(user) = self.users.get_mut(&str_field(body, "name")) {
                    user.0 = str_field(body, "password");
                }
                self.ok()
            }
            "auth/user/grant" => {
                let role = str_field(body, "role");
                if let Some(user) = self.users.get_mut(&str_field(body, "user")) {
                    user.1.push(role);
                }
                self.ok()
            }
            "auth/user/revoke" => {
                let role = str_field(body, "role");
                if let Some(user) = self.users.get_mut(&str_field(body, "name")) {
                    user.1.retain(|r| *r != role);
                }
                self.ok()
            }
            _ => {
                return Err(grpc_error(
                    StatusCode::NOT_IMPLEMENTED,
                    12,
                    "Not Implemented",
                ))
            }
        };
        Ok(reply)
    }

    fn put(&mut self, body: &Value) -> Value {
        let key = bytes_field(body, "key");
        let value = bytes_field(body, "value");
        let prev = self.kv.get(&key).cloned();

        self.revision += 1;
        let stored = StoredKv {
            value,
            create_revision: prev.as_ref().map_or(self.revision, |p| p.create_revision),
            mod_revision: self.revision,
            version: prev.as_ref().map_or(1, |p| p.version + 1),
            lease: int_field(body, "lease"),
        };
        self.kv.insert(key.clone(), stored);

        let mut reply = self.ok();
        if bool_field(body, "prev_kv") {
            if let Some(prev) = prev {
                reply["prev_kv"] = Self::kv_json(&key, &prev, false);
            }
        }
        reply
    }

    fn range(&self, body: &Value) -> Value {
        let keys = self.select(&bytes_field(body, "key"), &bytes_field(body, "range_end"));
        let keys_only = bool_field(body, "keys_only");

        let mut reply = self.ok();
        if !keys.is_empty() {
            let kvs: Vec<Value> = keys
                .iter()
                .map(|k| Self::kv_json(k, &self.kv[k], keys_only))
                .collect();
            reply["kvs"] = Value::Array(kvs);
            reply["count"] = json!(keys.len().to_string());
        }
        reply
    }

    fn delete_range(&mut self, body: &Value) -> Value {
        let keys = self.select(&bytes_field(body, "key"), &bytes_field(body, "range_end"));
        let removed: Vec<(Vec<u8>, StoredKv)> = keys
            .into_iter()
            .filter_map(|k| self.kv.remove(&k).map(|kv| (k, kv)))
            .collect();
        if !removed.is_empty() {
            self.revision += 1;
        }

        let mut reply = self.ok();
        if !removed.is_empty() {
            reply["deleted"] = json!(removed.len().to_string());
            if bool_field(body, "prev_kv") {
                let prev: Vec<Value> = removed
                    .iter()
                    .map(|(k, kv)| Self::kv_json(k, kv, false))
                    .collect();
                reply["prev_kvs"] = Value::Array(prev);
            }
        }
        reply
    }

    fn lease_grant(&mut self, body: &Value) -> Value {
        let ttl = int_field(body, "TTL");
        let id = match int_field(body, "ID") {
            0 => {
                self.next_lease += 1;
                self.next_lease
            }
            requested => requested,
        };
        self.leases.insert(id, ttl);
        json!({"header": self.header(), "ID": id.to_string(), "TTL": ttl.to_string()})
    }

    fn time_to_live(&self, body: &Value) -> Value {
        let id = int_field(body, "ID");
        let Some(ttl) = self.leases.get(&id) else {
            return json!({"header": self.header(), "ID": id.to_string(), "TTL": "-1"});
        };

        let mut reply = json!({
            "header": self.header(),
            "ID": id.to_string(),
            "TTL": ttl.to_string(),
            "grantedTTL": ttl.to_string(),
        });
        if bool_field(body, "keys") {
            let keys: Vec<String> = self
                .kv
                .iter()
                .filter(|(_, kv)| kv.lease == id)
                .map(|(k, _)| b64(k))
                .collect();
            if !keys.is_empty() {
                reply["keys"] = json!(keys);
            }
        }
        reply
    }

    fn authenticate(&mut self, body: &Value) -> Result<Value, Response> {
        let name = str_field(body, "name");
        let password = str_field(body, "password");
        match self.users.get(&name) {
            Some((stored, _)) if *stored == password => {
                let token = format!("mock-token.{}", self.issued_tokens.len() + 1);
                self.issued_tokens.push(token.clone());
                Ok(json!({"header": self.header(), "token": token}))
            }
            _ => Err(grpc_error(
                StatusCode::BAD_REQUEST,
                3,
                "etcdserver: authentication failed, invalid user ID or password",
            )),
        }
    }

    fn role_get(&self, body: &Value) -> Value {
        let mut reply = self.ok();
        if let Some(perms) = self.roles.get(&str_field(body, "role")) {
            if !perms.is_empty() {
                let perms: Vec<Value> = perms
                    .iter()
                    .map(|p| {
                        let mut perm = json!({
                            "permType": perm_type_name(p.perm_type),
                            "key": p.key,
                        });
                        if let Some(range_end) = &p.range_end {
                            perm["range_end"] = json!(range_end);
                        }
                        perm
                    })
                    .collect();
                reply["perm"] = Value::Array(perms);
            }
        }
        reply
    }
}
