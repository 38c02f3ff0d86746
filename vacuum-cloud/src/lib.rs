//! # vacuum-cloud
//!
//! A client library for cloud-connected robot vacuum devices. It consists
//! of four focused sub-crates wired together here for convenience:
//!
//! | Sub-crate         | Role                                               |
//! |--------------------|----------------------------------------------------|
//! | `vacuum-crypto`    | MD5/CRC32 helpers, frame-key derivation, AES-CBC    |
//! | `vacuum-protocol`  | Binary frame codec (plain and secure/301)           |
//! | `vacuum-account`   | HTTP login and home-data retrieval                  |
//! | `vacuum-bus`       | MQTT device bus: session, dispatch, device commands |
//! | `vacuum-map`       | Binary map blob parser and overlay renderer         |
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use vacuum_cloud::account::AccountClient;
//!
//! let mut account = AccountClient::new();
//! account.discover_region("user@example.com").await?;
//! account.request_email_code("user@example.com").await?;
//! // let user = account.login_with_code("user@example.com", "123456").await?;
//! // let home_id = account.home_id(&user).await?;
//! // let home = account.home_data(&user, home_id).await?;
//! # Ok(())
//! # }
//! ```

/// Re-export of [`vacuum_crypto`] — MD5/CRC32 helpers, frame-key derivation, AES-CBC.
pub use vacuum_crypto as crypto;

/// Re-export of [`vacuum_protocol`] — the binary frame codec.
pub use vacuum_protocol as protocol;

/// Re-export of [`vacuum_account`] — HTTP login and home-data retrieval.
pub use vacuum_account as account;

/// Re-export of [`vacuum_bus`] — the MQTT device bus.
pub use vacuum_bus as bus;

/// Re-export of [`vacuum_map`] (requires `feature = "map"`) — map parsing and rendering.
#[cfg(feature = "map")]
pub use vacuum_map as map;

// ─── Convenience re-exports ───────────────────────────────────────────────

pub use vacuum_account::{AccountClient, AccountError};
pub use vacuum_bus::{BusConfig, BusError, DeviceBus, DeviceProp, VacuumError};
pub use vacuum_protocol::{Frame, ProtocolId};

#[cfg(feature = "map")]
pub use vacuum_map::{parse as parse_map, render, MapData, MapError, RenderOptions};
