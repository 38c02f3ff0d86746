//! MQTT session lifecycle and request dispatcher for the cloud vacuum
//! protocol — the concurrency core.
//!
//! One [`DeviceBus`] owns one MQTT session to the cloud broker and
//! multiplexes `send_command` calls for every device reachable through it.
//! Incoming messages are dispatched by a single background task fed from
//! [`rumqttc::v5::EventLoop`]; `send_command` callers never touch the
//! network directly, they just await a oneshot completion with a deadline.

#![deny(unsafe_code)]

pub mod command;
pub mod config;
pub mod error;
pub mod pending;
pub mod retry;
pub mod session;

pub use command::DeviceProp;
pub use config::BusConfig;
pub use error::{BusError, VacuumError};
pub use retry::{AutoBackoff, NoRetries, RetryPolicy};
pub use session::SessionState;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pending::PendingTable;
use rumqttc::v5::mqttbytes::v5::Publish;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, Incoming, MqttOptions};
use serde::de::DeserializeOwned;
use serde_json::Value;
use session::Session;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use vacuum_account::{DeviceRecord, UserData};
use vacuum_protocol::{decode, encode, parse_secure_prelude, FrameFields, ProtocolId};

/// One device's credentials as known to the bus: its `local_key` plus an
/// endpoint id used to recognize secure (301) replies addressed to it.
#[derive(Clone)]
struct DeviceEntry {
    local_key: [u8; 16],
    /// Base64 of `md5(rriot.k)[8..14]` — a short prefix the device's own
    /// reply only needs to *start with*, not match exactly (spec/API note:
    /// the wire field is a fixed 15 bytes, padded with unspecified trailing
    /// bytes on the device side).
    endpoint: String,
}

struct Inner {
    client: AsyncClient,
    pending: Mutex<PendingTable>,
    session: Mutex<Session>,
    devices: HashMap<String, DeviceEntry>,
    config: BusConfig,
    mqtt_user: String,
    hashed_user: String,
    retry_policy: Mutex<Arc<dyn RetryPolicy>>,
}

/// Handle to a live MQTT session. Cheap to clone — clones share the same
/// connection, pending-request table and session state.
#[derive(Clone)]
pub struct DeviceBus {
    inner: Arc<Inner>,
}

fn local_key_bytes(hex_or_raw: &str) -> [u8; 16] {
    let mut key = [0u8; 16];
    let bytes = hex_or_raw.as_bytes();
    let n = bytes.len().min(16);
    key[..n].copy_from_slice(&bytes[..n]);
    key
}

/// `base64(md5(rriot.k)[8..14])` — the client's own endpoint identifier,
/// echoed by the device in every secure (301) reply's prelude.
fn endpoint_id(domain_key: &str) -> String {
    let digest = vacuum_crypto::md5_bytes!(domain_key.as_bytes());
    STANDARD.encode(&digest[8..14])
}

/// `username = md5_hex(u ":" k)[2..10]`, `password = md5_hex(s ":" k)[16..]` (spec §6).
/// The same username value also names the `{hashed_user}` topic segment.
fn derive_mqtt_credentials(u: &str, s: &str, k: &str) -> (String, String) {
    let user_digest = vacuum_crypto::digest::to_hex(&vacuum_crypto::md5_bytes!(format!("{u}:{k}").as_bytes()));
    let pass_digest = vacuum_crypto::digest::to_hex(&vacuum_crypto::md5_bytes!(format!("{s}:{k}").as_bytes()));
    let username = user_digest[2..10].to_string();
    let password = pass_digest[16..].to_string();
    (username, password)
}

impl DeviceBus {
    /// Build a bus for `user`'s home, ready to [`connect`](Self::connect).
    /// `devices` is typically `home_data.all_devices()` collected from
    /// [`vacuum_account::AccountClient::fetch_home`].
    pub fn new(user: &UserData, devices: impl IntoIterator<Item = DeviceRecord>, config: BusConfig) -> Self {
        let (mqtt_user, mqtt_pass) = derive_mqtt_credentials(&user.rriot.u, &user.rriot.s, &user.rriot.k);
        let hashed_user = mqtt_user.clone();

        let host_port = parse_broker_url(&user.rriot.r.m);
        let client_id = vacuum_crypto::digest::to_hex(format!("{}-{}", user.user_id, mqtt_user).as_bytes());

        let mut opts = MqttOptions::new(client_id, host_port.0, host_port.1);
        opts.set_keep_alive(config.keepalive);
        opts.set_clean_start(false);
        opts.set_credentials(mqtt_user.clone(), mqtt_pass);
        opts.set_session_expiry_interval(Some(config.session_expiry.as_secs() as u32));

        let (client, eventloop) = AsyncClient::new(opts, 64);

        let devices: HashMap<String, DeviceEntry> = devices
            .into_iter()
            .map(|d| {
                let entry = DeviceEntry { local_key: local_key_bytes(&d.local_key), endpoint: endpoint_id(&user.rriot.k) };
                (d.duid, entry)
            })
            .collect();

        let inner = Arc::new(Inner {
            client,
            pending: Mutex::new(PendingTable::new()),
            session: Mutex::new(Session::new(config.session_expiry)),
            devices,
            config,
            mqtt_user,
            hashed_user,
            retry_policy: Mutex::new(Arc::new(NoRetries)),
        });

        let bus = Self { inner };
        bus.spawn_dispatcher(eventloop);
        bus
    }

    /// Replace the default no-retry policy, e.g. with [`AutoBackoff`].
    pub async fn set_retry_policy(&self, policy: impl RetryPolicy) {
        *self.inner.retry_policy.lock().await = Arc::new(policy);
    }

    /// Subscribe to our inbound topic and wait for the subscription to be
    /// acknowledged (or for the connect timeout to elapse).
    pub async fn connect(&self) -> Result<(), BusError> {
        {
            let mut session = self.inner.session.lock().await;
            session.begin_connect();
        }
        let topic = format!("rr/m/o/{}/{}/#", self.inner.mqtt_user, self.inner.hashed_user);
        tokio::time::timeout(self.inner.config.connect_timeout, self.inner.client.subscribe(topic, QoS::AtMostOnce))
            .await
            .map_err(|_| BusError::TimedOut { method: "connect".into() })?
            .map_err(BusError::from)?;
        let mut session = self.inner.session.lock().await;
        session.mark_connected();
        Ok(())
    }

    /// A stale or disconnected session forces a reconnect before the next
    /// send (spec §4.4) — unlike [`SessionState::is_usable`], a `Stale`
    /// session here is *not* good enough; it only means requests were still
    /// being accepted while we decided whether to reconnect.
    async fn ensure_connected(&self) -> Result<(), BusError> {
        let needs_reconnect = {
            let mut session = self.inner.session.lock().await;
            session.check_staleness();
            *session.state() != SessionState::Connected
        };
        if needs_reconnect {
            self.connect().await?;
        }
        Ok(())
    }

    /// Send a typed command and decode its JSON result as `T`.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[Value]) -> Result<T, BusError> {
        let value = self.send_command(method, params, false).await?.unwrap_or(Value::Null);
        if let Some(err) = as_vacuum_error(&value) {
            return Err(BusError::Vacuum { method: method.into(), source: err });
        }
        serde_json::from_value(value)
            .map_err(|e| BusError::Vacuum { method: method.into(), source: VacuumError { code: -1, message: e.to_string() } })
    }

    /// Send a side-effecting command and ignore its (possibly never-arriving,
    /// see `send_command`'s `"ok"` handling) result.
    async fn call_no_response(&self, method: &str, params: &[Value]) -> Result<(), BusError> {
        let value = self.send_command(method, params, true).await?;
        if let Some(err) = value.as_ref().and_then(as_vacuum_error) {
            return Err(BusError::Vacuum { method: method.into(), source: err });
        }
        Ok(())
    }

    /// Send a command to the sole device on this bus. Buses with more than
    /// one device should use [`DeviceBus::send_command_to`] instead.
    pub async fn send_command(&self, method: &str, params: &[Value], no_response: bool) -> Result<Option<Value>, BusError> {
        let duid = self.inner.devices.keys().next().cloned().ok_or(BusError::Disconnected)?;
        self.send_command_to(&duid, method, params, no_response, false).await
    }

    /// Send a command addressed to a specific device and await its reply
    /// with the configured timeout. A `result` of the literal string `"ok"`
    /// does not complete the request (spec §4.4, §9) — the caller will time
    /// out; this mirrors the device firmware's own behavior for
    /// side-effecting setters rather than papering over it.
    ///
    /// `secure` attaches a `security` object to the inner envelope so the
    /// device replies over the 301 (binary) path instead of 102 (JSON).
    ///
    /// Retries according to the bus's configured [`RetryPolicy`] (none, by
    /// default) on timeouts and transport errors; a device-reported
    /// [`BusError::Vacuum`] is never retried.
    pub async fn send_command_to(
        &self,
        duid: &str,
        method: &str,
        params: &[Value],
        no_response: bool,
        secure: bool,
    ) -> Result<Option<Value>, BusError> {
        let mut fail_count = std::num::NonZeroU32::new(1).unwrap();
        let mut slept_so_far = Duration::ZERO;
        loop {
            match self.try_send_command_to(duid, method, params, no_response, secure).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let ctx = retry::RetryContext { fail_count, slept_so_far, error: &error };
                    let policy = self.inner.retry_policy.lock().await.clone();
                    match policy.should_retry(&ctx) {
                        std::ops::ControlFlow::Continue(delay) => {
                            tokio::time::sleep(delay).await;
                            slept_so_far += delay;
                            fail_count = fail_count.saturating_add(1);
                        }
                        std::ops::ControlFlow::Break(()) => return Err(error),
                    }
                }
            }
        }
    }

    async fn try_send_command_to(
        &self,
        duid: &str,
        method: &str,
        params: &[Value],
        no_response: bool,
        secure: bool,
    ) -> Result<Option<Value>, BusError> {
        self.ensure_connected().await?;
        let device = self.inner.devices.get(duid).ok_or(BusError::Disconnected)?.clone();

        let nonce = if secure {
            let mut buf = [0u8; 16];
            getrandom::getrandom(&mut buf).expect("getrandom failed");
            Some(buf)
        } else {
            None
        };

        let (request_id, rx) = {
            let mut pending = self.inner.pending.lock().await;
            pending.register_with_nonce(method, nonce)
        };

        let mut inner_body = serde_json::json!({
            "id": request_id,
            "method": method,
            "params": params,
        });
        if let Some(nonce) = nonce {
            inner_body["security"] = serde_json::json!({
                "endpoint": device.endpoint,
                "nonce": vacuum_crypto::digest::to_hex(&nonce).to_uppercase(),
            });
        }
        let envelope = serde_json::json!({
            "t": now_unix(),
            "dps": { "101": inner_body.to_string() },
        });

        let timestamp = now_unix() as u32;
        let fields = FrameFields { seq: request_id as u32, random: request_id as u32, timestamp, protocol: ProtocolId::Request };
        let bytes = encode(&fields, envelope.to_string().as_bytes(), &device.local_key);

        let topic = format!("rr/m/i/{}/{}/{duid}", self.inner.mqtt_user, self.inner.hashed_user);
        self.inner.client.publish(topic, QoS::AtMostOnce, false, bytes).await.map_err(BusError::from)?;

        if no_response {
            return Ok(None);
        }

        match tokio::time::timeout(self.inner.config.connect_timeout, rx).await {
            Ok(Ok(body)) => Ok(Some(body)),
            Ok(Err(_)) => Err(BusError::Disconnected),
            Err(_) => {
                self.inner.pending.lock().await.abandon(request_id);
                Err(BusError::TimedOut { method: method.into() })
            }
        }
    }

    /// Fetch the current map blob over the secure (binary) path.
    pub async fn get_map_v1(&self) -> Result<Vec<u8>, BusError> {
        let duid = self.inner.devices.keys().next().cloned().ok_or(BusError::Disconnected)?;
        let value = self.send_command_to(&duid, "get_map_v1", &[], false, true).await?;
        match value {
            Some(Value::Array(bytes)) => Ok(bytes
                .into_iter()
                .filter_map(|v| v.as_u64().map(|n| n as u8))
                .collect()),
            _ => Err(BusError::TimedOut { method: "get_map_v1".into() }),
        }
    }

    fn spawn_dispatcher(&self, mut eventloop: EventLoop) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        dispatch_publish(&inner, publish).await;
                    }
                    Ok(Event::Incoming(Incoming::Disconnect(_))) => {
                        let mut session = inner.session.lock().await;
                        session.mark_disconnected();
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("mqtt event loop error: {e}");
                        let mut session = inner.session.lock().await;
                        session.mark_disconnected();
                        inner.pending.lock().await.fail_all();
                        tokio::time::sleep(Duration::from_millis(250)).await;
                    }
                }
            }
        });
    }
}

async fn dispatch_publish(inner: &Arc<Inner>, publish: Publish) {
    let topic = String::from_utf8_lossy(&publish.topic).into_owned();
    let Some(duid) = topic.rsplit('/').next() else { return };
    let Some(device) = inner.devices.get(duid) else { return };

    {
        let mut session = inner.session.lock().await;
        session.note_traffic();
    }

    let frame = match decode(&publish.payload, &device.local_key) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("dropping undecodable frame from {duid}: {e}");
            return;
        }
    };

    match frame.protocol {
        ProtocolId::Response => dispatch_json_response(inner, &frame.payload).await,
        ProtocolId::SecureResponse => dispatch_secure_response(inner, device, &frame.payload).await,
        ProtocolId::RemoteControl => log::debug!("remote-control notification from {duid}, dropping"),
        ProtocolId::Request => {}
        ProtocolId::Unknown(code) => log::debug!("unknown protocol {code} from {duid}, dropping"),
    }
}

async fn dispatch_json_response(inner: &Arc<Inner>, payload: &[u8]) {
    let Ok(envelope) = serde_json::from_slice::<Value>(payload) else { return };
    let Some(inner_str) = envelope.pointer("/dps/102").and_then(Value::as_str) else { return };
    let Ok(inner_value) = serde_json::from_str::<Value>(inner_str) else { return };
    let Some(id) = inner_value.get("id").and_then(Value::as_u64).map(|v| v as u16) else { return };

    if let Some(err) = inner_value.get("error") {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or(0) as i32;
        let message = err.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
        let mut pending = inner.pending.lock().await;
        pending.complete(id, serde_json::json!({ "__vacuum_error__": { "code": code, "message": message } }));
        return;
    }

    let Some(mut result) = inner_value.get("result").cloned() else { return };
    if let Value::Array(items) = &result {
        if items.len() == 1 {
            result = items[0].clone();
        }
    }
    if result == Value::String("ok".to_string()) {
        // Acknowledgement only — the real outcome, if any, arrives later or
        // never. Do not complete the pending request (spec §4.4, §9).
        return;
    }

    let mut pending = inner.pending.lock().await;
    pending.complete(id, result);
}

async fn dispatch_secure_response(inner: &Arc<Inner>, device: &DeviceEntry, payload: &[u8]) {
    let (prelude, ciphertext) = match parse_secure_prelude(payload) {
        Ok(parts) => parts,
        Err(e) => {
            log::debug!("dropping truncated secure frame: {e}");
            return;
        }
    };
    if !prelude.endpoint.starts_with(device.endpoint.as_bytes()) {
        return;
    }
    let Some(nonce) = inner.pending.lock().await.nonce_of(prelude.request_id) else {
        log::debug!("secure reply for unknown or non-secure request {}", prelude.request_id);
        return;
    };
    match vacuum_crypto::aes::secure_decrypt(&nonce, ciphertext) {
        Ok(bytes) => {
            let value = Value::Array(bytes.into_iter().map(|b| Value::Number(b.into())).collect());
            let mut pending = inner.pending.lock().await;
            pending.complete(prelude.request_id, value);
        }
        Err(e) => log::debug!("dropping corrupt secure frame: {e}"),
    }
}

fn as_vacuum_error(value: &Value) -> Option<VacuumError> {
    let err = value.get("__vacuum_error__")?;
    Some(VacuumError {
        code: err.get("code").and_then(Value::as_i64).unwrap_or(0) as i32,
        message: err.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
    })
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn parse_broker_url(url: &str) -> (String, u16) {
    let without_scheme = url.split("://").last().unwrap_or(url);
    let mut parts = without_scheme.splitn(2, ':');
    let host = parts.next().unwrap_or(without_scheme).to_string();
    let port = parts.next().and_then(|p| p.trim_end_matches('/').parse().ok()).unwrap_or(8883);
    (host, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mqtt_credentials_use_the_documented_offsets() {
        let (user, pass) = derive_mqtt_credentials("abc123", "secretsecret", "domainkey");
        assert_eq!(user.len(), 8);
        assert!(pass.len() <= 16);
    }

    #[test]
    fn broker_url_parses_scheme_and_port() {
        assert_eq!(parse_broker_url("ssl://mqtt.example.com:8883"), ("mqtt.example.com".to_string(), 8883));
        assert_eq!(parse_broker_url("ssl://mqtt.example.com"), ("mqtt.example.com".to_string(), 8883));
    }

    #[test]
    fn local_key_bytes_pads_short_keys_with_zeroes() {
        let k = local_key_bytes("abc");
        assert_eq!(&k[..3], b"abc");
        assert_eq!(&k[3..], &[0u8; 13]);
    }
}
