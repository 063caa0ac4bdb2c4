//! Client for the etcd v3 JSON gateway.
//!
//! Every method follows the same path: build parameters, base64-encode the
//! binary fields, POST to a fixed endpoint, decode the designated fields of
//! the reply and, in pretty mode, shape it.

use std::fmt;

use reqwest::Url;
use tracing::{debug, warn};

use crate::codec::{self, KV_FIELDS, PERM_FIELDS};
use crate::config::{Config, ConfigError};
use crate::endpoint::Endpoint;
use crate::error::{GatewayError, Result};
use crate::etcd::Permission;
use crate::params::Params;
use crate::shaper;
use crate::value::{KeyValueMap, Object, Reply, Value};

/// Header carrying the auth token, forwarded by the gateway as gRPC metadata.
pub const TOKEN_HEADER: &str = "Grpc-Metadata-Token";

/// Field sent when a request would otherwise have an empty body.
pub const PLACEHOLDER_FIELD: &str = "etcd-gateway-client";

/// Bytes stripped from both ends of a prefix before computing its range.
const PREFIX_TRIM: &[u8] = b" \t\n\r\0\x0b";

/// Gateway client bound to one configuration.
///
/// The optional auth token is the only mutable state. Methods that change
/// it take `&mut self`; share a client across tasks only behind a lock, or
/// give each concurrent caller its own client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    config: Config,
    base_url: Url,
    token: Option<String>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("pretty", &self.config.is_pretty())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Client {
    /// Create a client. Fails on invalid configuration before any request.
    pub fn new(config: Config) -> Result<Self> {
        let base_url = config.base_url()?;

        let mut builder = reqwest::Client::builder().timeout(config.timeout());
        if let Some(identity) = config.identity()? {
            builder = builder.identity(identity);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            config,
            base_url,
            token: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Attach `token` to every subsequent request.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    fn pretty(&self) -> bool {
        self.config.is_pretty()
    }

    fn url_for(&self, endpoint: Endpoint) -> Result<Url> {
        self.base_url
            .join(endpoint.path())
            .map_err(|e| ConfigError::InvalidUrl(format!("{endpoint}: {e}")).into())
    }

    /// POST `params` (merged with `options`, which win on conflict) to
    /// `endpoint` and return the decoded body, envelope stripped in pretty
    /// mode.
    ///
    /// No binary encoding happens here; callers encode what needs it. This
    /// is also the way to reach endpoints without a dedicated method, such
    /// as [`Endpoint::Txn`].
    pub async fn request(
        &self,
        endpoint: Endpoint,
        mut params: Params,
        options: Params,
    ) -> Result<Object> {
        params.merge(options);
        if params.is_empty() {
            params.insert(PLACEHOLDER_FIELD, 1);
        }

        let url = self.url_for(endpoint)?;
        debug!(
            %endpoint,
            %url,
            authenticated = self.token.is_some(),
            "Posting to etcd gateway"
        );

        let mut request = self.http.post(url).json(&params.into_json());
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let body = serde_json::from_str::<serde_json::Value>(&text)
                .map(Value::from)
                .unwrap_or(Value::String(text));
            warn!(%endpoint, %status, body = %body, "etcd gateway returned error status");
            return Err(GatewayError::Status { status, body });
        }

        let mut body = match Value::from(serde_json::from_str::<serde_json::Value>(&text)?) {
            Value::Object(body) => body,
            other => {
                return Err(GatewayError::UnexpectedShape(format!(
                    "{endpoint} replied with non-object body: {other}"
                )))
            }
        };
        shaper::strip_envelope(&mut body, self.pretty());
        Ok(body)
    }

    // ========================================================================
    // KV
    // ========================================================================

    /// Put `key` = `value`.
    ///
    /// Options: `lease`, `prev_kv`, `ignore_value`, `ignore_lease`. With
    /// `prev_kv` in pretty mode the previous value is returned directly.
    pub async fn put(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: Option<Params>,
    ) -> Result<Reply> {
        let params = Params::new()
            .with("key", key.as_ref())
            .with("value", value.as_ref());
        let body = self
            .request(
                Endpoint::Put,
                codec::encode(params),
                codec::encode(options.unwrap_or_default()),
            )
            .await?;

        let body = codec::decode_fields(body, "prev_kv", KV_FIELDS);
        Ok(shaper::flatten_field(body, "prev_kv", self.pretty()))
    }

    /// Get a key or range of keys.
    ///
    /// Options: `range_end`, `limit`, `revision`, `sort_order`,
    /// `sort_target`, `serializable`, `keys_only`, `count_only`,
    /// `min_mod_revision`, `max_mod_revision`, `min_create_revision`,
    /// `max_create_revision`. Pretty mode returns a key to value map.
    pub async fn get(&self, key: impl AsRef<[u8]>, options: Option<Params>) -> Result<Reply> {
        let params = Params::new().with("key", key.as_ref());
        let body = self
            .request(
                Endpoint::Range,
                codec::encode(params),
                codec::encode(options.unwrap_or_default()),
            )
            .await?;

        let body = codec::decode_fields(body, "kvs", KV_FIELDS);
        Ok(shaper::flatten_field(body, "kvs", self.pretty()))
    }

    /// Every key in the keyspace: `\0` to `\0` is etcd's full range.
    pub async fn get_all_keys(&self) -> Result<Reply> {
        self.get(b"\0", Some(Params::new().with("range_end", b"\0")))
            .await
    }

    /// Every key starting with `prefix`.
    ///
    /// A prefix that is empty after trimming returns an empty result without
    /// contacting the gateway.
    pub async fn get_keys_with_prefix(&self, prefix: impl AsRef<[u8]>) -> Result<Reply> {
        let prefix = trim_prefix(prefix.as_ref());
        let Some(range_end) = prefix_range_end(prefix) else {
            return Ok(Reply::Records(KeyValueMap::new()));
        };

        self.get(prefix, Some(Params::new().with("range_end", range_end)))
            .await
    }

    /// Delete a key or range of keys.
    ///
    /// Options: `range_end`, `prev_kv`. Pretty mode with `prev_kv` returns
    /// the deleted pairs as a map.
    pub async fn del(&self, key: impl AsRef<[u8]>, options: Option<Params>) -> Result<Reply> {
        let params = Params::new().with("key", key.as_ref());
        let body = self
            .request(
                Endpoint::DeleteRange,
                codec::encode(params),
                codec::encode(options.unwrap_or_default()),
            )
            .await?;

        let body = codec::decode_fields(body, "prev_kvs", KV_FIELDS);
        Ok(shaper::flatten_field(body, "prev_kvs", self.pretty()))
    }

    /// Compact the event history up to `revision`.
    pub async fn compaction(&self, revision: i64, physical: bool) -> Result<Object> {
        let params = Params::new()
            .with("revision", revision)
            .with("physical", physical);
        self.request(Endpoint::Compaction, params, Params::new()).await
    }

    // ========================================================================
    // Lease
    // ========================================================================

    /// Grant a lease of `ttl` seconds. An `id` of 0 lets the server pick.
    pub async fn grant(&self, ttl: i64, id: i64) -> Result<Object> {
        let params = Params::new().with("TTL", ttl).with("ID", id);
        self.request(Endpoint::LeaseGrant, params, Params::new()).await
    }

    /// Revoke a lease, deleting every key attached to it.
    pub async fn revoke(&self, id: i64) -> Result<Object> {
        let params = Params::new().with("ID", id);
        self.request(Endpoint::LeaseRevoke, params, Params::new()).await
    }

    /// Refresh a lease once. Returns `{ID, TTL}` in either mode.
    pub async fn keep_alive(&self, id: i64) -> Result<Object> {
        let params = Params::new().with("ID", id);
        let body = self
            .request(Endpoint::LeaseKeepAlive, params, Params::new())
            .await?;
        Ok(shaper::unwrap_keepalive(body))
    }

    /// Lease information; with `keys` the attached keys are listed as bytes.
    pub async fn time_to_live(&self, id: i64, keys: bool) -> Result<Object> {
        let params = Params::new().with("ID", id).with("keys", keys);
        let body = self
            .request(Endpoint::LeaseTimeToLive, params, Params::new())
            .await?;
        Ok(codec::decode_flat_list(body, "keys"))
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Enable authentication. Clears the stored token whether or not the
    /// gateway accepted the call.
    pub async fn auth_enable(&mut self) -> Result<Object> {
        let result = self
            .request(Endpoint::AuthEnable, Params::new(), Params::new())
            .await;
        self.clear_token();
        result
    }

    /// Disable authentication. Clears the stored token whether or not the
    /// gateway accepted the call.
    pub async fn auth_disable(&mut self) -> Result<Object> {
        let result = self
            .request(Endpoint::AuthDisable, Params::new(), Params::new())
            .await;
        self.clear_token();
        result
    }

    /// Authenticate and keep the returned token for later requests.
    ///
    /// Pretty mode returns just the token.
    pub async fn authenticate(&mut self, user: &str, password: &str) -> Result<Reply> {
        let params = Params::new().with("name", user).with("password", password);
        let body = self
            .request(Endpoint::Authenticate, params, Params::new())
            .await?;

        if let Some(token) = body.get("token").and_then(Value::as_str) {
            self.token = Some(token.to_string());
        }
        Ok(shaper::unwrap_field(body, "token", self.pretty()))
    }

    // ========================================================================
    // Role
    // ========================================================================

    pub async fn add_role(&self, name: &str) -> Result<Object> {
        let params = Params::new().with("name", name);
        self.request(Endpoint::RoleAdd, params, Params::new()).await
    }

    /// Role details. Pretty mode returns just the permission list, with
    /// `key` and `range_end` decoded.
    pub async fn get_role(&self, role: &str) -> Result<Reply> {
        let params = Params::new().with("role", role);
        let body = self.request(Endpoint::RoleGet, params, Params::new()).await?;
        let body = codec::decode_fields(body, "perm", PERM_FIELDS);
        Ok(shaper::unwrap_field(body, "perm", self.pretty()))
    }

    pub async fn delete_role(&self, role: &str) -> Result<Object> {
        let params = Params::new().with("role", role);
        self.request(Endpoint::RoleDelete, params, Params::new()).await
    }

    /// All role names. Pretty mode returns just the list.
    pub async fn role_list(&self) -> Result<Reply> {
        let body = self
            .request(Endpoint::RoleList, Params::new(), Params::new())
            .await?;
        Ok(shaper::unwrap_field(body, "roles", self.pretty()))
    }

    // ========================================================================
    // User
    // ========================================================================

    pub async fn add_user(&self, user: &str, password: &str) -> Result<Object> {
        let params = Params::new().with("name", user).with("password", password);
        self.request(Endpoint::UserAdd, params, Params::new()).await
    }

    /// User details. Pretty mode returns just the user's roles.
    pub async fn get_user(&self, user: &str) -> Result<Reply> {
        let params = Params::new().with("name", user);
        let body = self.request(Endpoint::UserGet, params, Params::new()).await?;
        Ok(shaper::unwrap_field(body, "roles", self.pretty()))
    }

    pub async fn delete_user(&self, user: &str) -> Result<Object> {
        let params = Params::new().with("name", user);
        self.request(Endpoint::UserDelete, params, Params::new()).await
    }

    /// All user names. Pretty mode returns just the list.
    pub async fn user_list(&self) -> Result<Reply> {
        let body = self
            .request(Endpoint::UserList, Params::new(), Params::new())
            .await?;
        Ok(shaper::unwrap_field(body, "users", self.pretty()))
    }

    pub async fn change_user_password(&self, user: &str, password: &str) -> Result<Object> {
        let params = Params::new().with("name", user).with("password", password);
        self.request(Endpoint::UserChangePassword, params, Params::new())
            .await
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    /// Grant `permission` on `key` (or `[key, range_end)`) to `role`.
    ///
    /// The permission is a nested object, so its binary fields are encoded
    /// here rather than by the flat parameter encoder.
    pub async fn grant_role_permission(
        &self,
        role: &str,
        permission: Permission,
        key: impl AsRef<[u8]>,
        range_end: Option<&[u8]>,
    ) -> Result<Object> {
        let mut perm = Params::new()
            .with("permType", permission.code())
            .with("key", codec::encode_bytes(key.as_ref()));
        if let Some(range_end) = range_end {
            perm.insert("range_end", codec::encode_bytes(range_end));
        }

        let params = Params::new().with("name", role).with("perm", perm);
        self.request(Endpoint::RoleGrantPermission, params, Params::new())
            .await
    }

    /// Revoke the permission on `key` (or `[key, range_end)`) from `role`.
    pub async fn revoke_role_permission(
        &self,
        role: &str,
        key: &str,
        range_end: Option<&str>,
    ) -> Result<Object> {
        let mut params = Params::new().with("role", role).with("key", key);
        if let Some(range_end) = range_end {
            params.insert("range_end", range_end);
        }
        self.request(Endpoint::RoleRevokePermission, params, Params::new())
            .await
    }

    pub async fn grant_user_role(&self, user: &str, role: &str) -> Result<Object> {
        let params = Params::new().with("user", user).with("role", role);
        self.request(Endpoint::UserGrantRole, params, Params::new())
            .await
    }

    pub async fn revoke_user_role(&self, user: &str, role: &str) -> Result<Object> {
        let params = Params::new().with("name", user).with("role", role);
        self.request(Endpoint::UserRevokeRole, params, Params::new())
            .await
    }
}

fn trim_prefix(prefix: &[u8]) -> &[u8] {
    let start = prefix
        .iter()
        .position(|b| !PREFIX_TRIM.contains(b))
        .unwrap_or(prefix.len());
    let end = prefix
        .iter()
        .rposition(|b| !PREFIX_TRIM.contains(b))
        .map_or(start, |i| i + 1);
    &prefix[start..end]
}

/// Range end for a prefix scan: the prefix with its last byte incremented.
///
/// Returns `None` for an empty prefix. A trailing `0xff` wraps to `0x00`
/// rather than carrying into the previous byte.
pub fn prefix_range_end(prefix: &[u8]) -> Option<Vec<u8>> {
    // TODO: carry past trailing 0xff bytes the way etcd's clientv3 GetPrefixRangeEnd does.
    let (last, _) = prefix.split_last()?;
    let mut range_end = prefix.to_vec();
    let idx = range_end.len() - 1;
    range_end[idx] = last.wrapping_add(1);
    Some(range_end)
}
