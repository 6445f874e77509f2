//! Integration tests for OAuth wire types
//!
//! Payloads mirror what the identity platform returns for the device
//! authorization and token endpoints.

#![cfg(feature = "foundation")]

use chrono::{Duration, TimeZone, Utc};
use workbridge_common::auth::{DeviceCodeInfo, DeviceCodeResponse, OAuthError, OAuthErrorKind, TokenResponse, TokenSet};

#[test]
fn device_authorization_payload_becomes_host_prompt() {
    let body = r#"{
        "device_code": "GMMhmHCXhWEzkobqIHGG_EnNYYsAkukHspeYUk9E8",
        "user_code": "WDJB-MJHT",
        "verification_uri": "https://microsoft.com/devicelogin",
        "expires_in": 1800,
        "interval": 5,
        "message": "To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code WDJB-MJHT to authenticate."
    }"#;
    let response: DeviceCodeResponse = serde_json::from_str(body).unwrap();
    let info = DeviceCodeInfo::from(&response);

    assert_eq!(info.user_code, "WDJB-MJHT");
    assert_eq!(info.expires_in_secs, 1800);
    assert!(info.message.as_deref().unwrap_or_default().contains("WDJB-MJHT"));

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["verificationUri"], "https://microsoft.com/devicelogin");
}

#[test]
fn cached_token_set_survives_serialization() {
    let now = Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap();
    let response: TokenResponse = serde_json::from_str(
        r#"{"token_type":"Bearer","access_token":"eyJ0","refresh_token":"0.AR","expires_in":4599}"#,
    )
    .unwrap();
    let scopes = vec!["499b84ac-1321-427f-aa17-267ca6975798/.default".to_string()];
    let tokens = TokenSet::from_response(response, now, &scopes, Some("tenant-1".into()), None);

    let stored = serde_json::to_string(&tokens).unwrap();
    let restored: TokenSet = serde_json::from_str(&stored).unwrap();

    assert_eq!(restored, tokens);
    assert_eq!(restored.expires_at, Some(now + Duration::seconds(4599)));
    assert!(!restored.is_expired_at(now, Duration::minutes(5)));
}

#[test]
fn polling_errors_are_classified() {
    let slow: OAuthError = serde_json::from_str(r#"{"error":"slow_down"}"#).unwrap();
    assert_eq!(slow.kind(), OAuthErrorKind::SlowDown);

    let expired: OAuthError = serde_json::from_str(
        r#"{"error":"expired_token","error_description":"AADSTS70020: The provided value for the input parameter 'device_code' is not valid."}"#,
    )
    .unwrap();
    assert_eq!(expired.kind(), OAuthErrorKind::ExpiredToken);
    assert!(expired.to_string().starts_with("expired_token: AADSTS70020"));
}
