//! Data returned by the account service. Decoded eagerly into concrete
//! typed fields rather than carried around as JSON dicts — unknown fields
//! are simply discarded during deserialization.

use serde::Deserialize;

/// The `rriot.r` reference block: broker and API endpoint addresses.
#[derive(Clone, Debug, Deserialize)]
pub struct ReferenceBlock {
    /// Riot/region base URL.
    pub r: String,
    /// Home-data API base URL, used for `GET {a}/user/homes/{id}`.
    pub a: String,
    /// MQTT broker URL, e.g. `ssl://mqtt.example.com:8883`.
    #[serde(default)]
    pub m: String,
    /// Login/auth base URL.
    #[serde(default)]
    pub l: String,
}

/// The cloud-credentials sub-block embedded in [`UserData`].
#[derive(Clone, Deserialize)]
pub struct RRiot {
    /// MQTT username component.
    pub u: String,
    /// MQTT secret / password component.
    pub s: String,
    /// Hawk/HMAC signing secret for the home endpoint.
    pub h: String,
    /// Key-derivation domain, combined with `u` for MQTT credential hashing.
    pub k: String,
    pub r: ReferenceBlock,
}

/// Result of a successful login. Immutable; consumed by [`vacuum_bus`](https://docs.rs/vacuum-bus).
#[derive(Clone, Debug, Deserialize)]
pub struct UserData {
    pub token: String,
    #[serde(rename = "uid")]
    pub user_id: i64,
    pub rriot: RRiot,
}

/// A single device as reported by the home endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct DeviceRecord {
    pub duid: String,
    #[serde(default)]
    pub product_id: String,
    pub name: String,
    /// Per-device AES key seed. Never logged, never leaves the record.
    pub local_key: String,
}

impl std::fmt::Debug for RRiot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RRiot")
            .field("u", &self.u)
            .field("s", &"<redacted>")
            .field("h", &"<redacted>")
            .field("k", &self.k)
            .field("r", &self.r)
            .finish()
    }
}

/// Home snapshot: the devices registered to the logged-in account's home.
#[derive(Clone, Debug, Deserialize)]
pub struct HomeData {
    pub id: i64,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default, rename = "receivedDevices")]
    pub received_devices: Vec<DeviceRecord>,
}

impl HomeData {
    /// All devices visible to the account: owned plus shared/received.
    pub fn all_devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.iter().chain(self.received_devices.iter())
    }
}
