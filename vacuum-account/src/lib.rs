//! HTTP client for the cloud account service.
//!
//! Five calls, all HTTPS/JSON, get a caller from an email address to a
//! [`model::UserData`] and a [`model::HomeData`] snapshot of their devices:
//!
//! 1. [`AccountClient::discover_region`] — `getUrlByEmail`
//! 2. [`AccountClient::request_email_code`] — `sendEmailCode`
//! 3. [`AccountClient::login_with_code`] — `loginWithCode`
//! 4. [`AccountClient::home_id`] — `getHomeDetail`
//! 5. [`AccountClient::home_data`] — Hawk-signed `GET {a}/user/homes/{id}`
//!
//! No retry is performed at this layer; a non-200 `code` (or `success:
//! false` on the Hawk-signed call) is surfaced as [`error::AccountError`].

#![deny(unsafe_code)]

mod error;
mod hawk;
mod model;

pub use error::{AccountError, Error};
pub use model::{DeviceRecord, HomeData, RRiot, ReferenceBlock, UserData};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};
use vacuum_crypto::md5_bytes;

/// Default region-discovery endpoint. Overridable via [`AccountClient::with_base_url`].
pub const DEFAULT_REGION_ENDPOINT: &str = "https://euiot.roborock.com";

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    code: i32,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    success: Option<bool>,
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    fn into_data(self) -> Result<T, error::Error> {
        if self.code != 200 || self.success == Some(false) {
            log::warn!("account API call failed: code={} msg={}", self.code, self.msg);
            return Err(error::AccountError { code: self.code, message: self.msg }.into());
        }
        self.data.ok_or_else(|| error::Error::Decode("missing `data` field".into()))
    }
}

#[derive(Deserialize)]
struct UrlByEmailData {
    url: String,
}

#[derive(Deserialize)]
struct HomeDetailData {
    #[serde(rename = "rrHomeId")]
    rr_home_id: i64,
}

/// HTTP client for the account service. Cheap to clone (wraps a `reqwest::Client`).
#[derive(Clone)]
pub struct AccountClient {
    http: reqwest::Client,
    base_url: String,
    device_identifier: String,
}

impl AccountClient {
    /// Build a client that discovers its region endpoint from `email`.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_REGION_ENDPOINT.to_string(),
            device_identifier: random_device_identifier(),
        }
    }

    /// Build a client pinned to a known base URL, skipping region discovery.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            device_identifier: random_device_identifier(),
        }
    }

    /// `GET /api/v1/getUrlByEmail?email=...` — resolves the region-specific
    /// base URL for `email` and adopts it for subsequent calls.
    pub async fn discover_region(&mut self, email: &str) -> Result<(), error::Error> {
        let url = format!("{}/api/v1/getUrlByEmail", self.base_url);
        let resp: ApiEnvelope<UrlByEmailData> = self
            .http
            .get(url)
            .query(&[("email", email)])
            .send()
            .await?
            .json()
            .await?;
        self.base_url = resp.into_data()?.url;
        log::info!("account region resolved to {}", self.base_url);
        Ok(())
    }

    /// `POST /api/v1/sendEmailCode?username=…&type=auth`. Side effect only.
    pub async fn request_email_code(&self, username: &str) -> Result<(), error::Error> {
        let url = format!("{}/api/v1/sendEmailCode", self.base_url);
        let client_id = STANDARD.encode(md5_bytes!(format!("{username}{}", self.device_identifier).as_bytes()));
        let resp: ApiEnvelope<serde_json::Value> = self
            .http
            .post(url)
            .query(&[("username", username), ("type", "auth")])
            .header("header_clientid", client_id)
            .send()
            .await?
            .json()
            .await?;
        resp.into_data().map(|_| ())
    }

    /// `POST /api/v1/loginWithCode?username=…&verifycode=…&verifycodetype=AUTH_EMAIL_CODE`.
    pub async fn login_with_code(&self, username: &str, code: &str) -> Result<UserData, error::Error> {
        let url = format!("{}/api/v1/loginWithCode", self.base_url);
        let resp: ApiEnvelope<UserData> = self
            .http
            .post(url)
            .query(&[
                ("username", username),
                ("verifycode", code),
                ("verifycodetype", "AUTH_EMAIL_CODE"),
            ])
            .send()
            .await?
            .json()
            .await?;
        resp.into_data()
    }

    /// `GET /api/v1/getHomeDetail` with a bearer token — returns `rrHomeId`.
    pub async fn home_id(&self, user: &UserData) -> Result<i64, error::Error> {
        let url = format!("{}/api/v1/getHomeDetail", self.base_url);
        let resp: ApiEnvelope<HomeDetailData> = self
            .http
            .get(url)
            .bearer_auth(&user.token)
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.into_data()?.rr_home_id)
    }

    /// `GET {rriot.r.a}/user/homes/{home_id}` with a Hawk-signed
    /// `Authorization` header — fetches the device list for the account's home.
    pub async fn home_data(&self, user: &UserData, home_id: i64) -> Result<HomeData, error::Error> {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let header = hawk::sign_home_request(&user.rriot.u, &user.rriot.s, &user.rriot.h, home_id, ts);

        let url = format!("{}/user/homes/{home_id}", user.rriot.r.a);
        let resp: ApiEnvelope<HomeData> = self
            .http
            .get(url)
            .header("Authorization", header.value)
            .send()
            .await?
            .json()
            .await?;
        resp.into_data()
    }

    /// Convenience: run the full `getHomeDetail` → Hawk `homes/{id}` pair.
    pub async fn fetch_home(&self, user: &UserData) -> Result<HomeData, error::Error> {
        let home_id = self.home_id(user).await?;
        self.home_data(user, home_id).await
    }
}

impl Default for AccountClient {
    fn default() -> Self { Self::new() }
}

fn random_device_identifier() -> String {
    let mut buf = [0u8; 8];
    getrandom::getrandom(&mut buf).expect("getrandom failed");
    vacuum_crypto::digest::to_hex(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_surfaces_non_200_as_account_error() {
        let env: ApiEnvelope<serde_json::Value> = ApiEnvelope { code: 401, msg: "bad code".into(), success: None, data: None };
        let err = env.into_data().unwrap_err();
        match err {
            error::Error::Account(e) => {
                assert_eq!(e.code, 401);
                assert_eq!(e.message, "bad code");
            }
            other => panic!("expected Account error, got {other:?}"),
        }
    }

    #[test]
    fn envelope_rejects_success_false_even_with_code_200() {
        let env: ApiEnvelope<serde_json::Value> = ApiEnvelope {
            code: 200,
            msg: "mac mismatch".into(),
            success: Some(false),
            data: Some(serde_json::json!({})),
        };
        assert!(env.into_data().is_err());
    }
}
