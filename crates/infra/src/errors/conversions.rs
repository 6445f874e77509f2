//! Conversions from external infrastructure errors into domain errors.

use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use workbridge_common::security::KeychainError;
use workbridge_domain::ConnectionError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ConnectionError);

impl From<InfraError> for ConnectionError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ConnectionError> for InfraError {
    fn from(value: ConnectionError) -> Self {
        InfraError(value)
    }
}

trait IntoConnectionError {
    fn into_connection_error(self) -> ConnectionError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → ConnectionError */
/* -------------------------------------------------------------------------- */

impl IntoConnectionError for KeyringError {
    fn into_connection_error(self) -> ConnectionError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => ConnectionError::SecretStore("keychain entry not found".into()),
            BadEncoding(_) => {
                ConnectionError::SecretStore("credential in keychain is not valid UTF-8".into())
            }
            TooLong(name, limit) => ConnectionError::SecretStore(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => ConnectionError::SecretStore(format!(
                "keychain attribute '{attr}' is invalid: {reason}"
            )),
            Ambiguous(entries) => ConnectionError::SecretStore(format!(
                "multiple keychain entries matched request ({} results)",
                entries.len()
            )),
            PlatformFailure(err) => {
                ConnectionError::SecretStore(format!("keychain platform error: {err}"))
            }
            NoStorageAccess(err) => {
                ConnectionError::SecretStore(format!("unable to access secure storage: {err}"))
            }
            _ => ConnectionError::SecretStore(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_connection_error())
    }
}

impl From<KeychainError> for InfraError {
    fn from(value: KeychainError) -> Self {
        match value {
            KeychainError::Keyring(inner) => inner.into(),
            KeychainError::NotFound => {
                InfraError(ConnectionError::SecretStore("keychain entry not found".into()))
            }
            KeychainError::AccessFailed(message) => InfraError(ConnectionError::SecretStore(message)),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ConnectionError */
/* -------------------------------------------------------------------------- */

impl IntoConnectionError for HttpError {
    fn into_connection_error(self) -> ConnectionError {
        if self.is_timeout() {
            return ConnectionError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ConnectionError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => ConnectionError::AuthFailure(message),
                400..=499 => ConnectionError::GenericConnectionError(message),
                _ => ConnectionError::Network(message),
            };
        }

        if self.is_decode() {
            return ConnectionError::GenericConnectionError(format!(
                "unexpected response body: {self}"
            ));
        }

        ConnectionError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_connection_error())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn keyring_no_entry_maps_to_secret_store() {
        let mapped: ConnectionError = InfraError::from(KeyringError::NoEntry).into();
        match mapped {
            ConnectionError::SecretStore(msg) => assert!(msg.contains("keychain")),
            other => panic!("expected secret store error, got {other:?}"),
        }
    }

    #[test]
    fn keychain_access_failure_keeps_message() {
        let mapped: ConnectionError =
            InfraError::from(KeychainError::AccessFailed("locked".into())).into();
        assert_eq!(mapped, ConnectionError::SecretStore("locked".into()));
    }

    #[tokio::test]
    async fn http_status_401_maps_to_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: ConnectionError = InfraError::from(error).into();
        match mapped {
            ConnectionError::AuthFailure(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_status_503_is_network_flavoured() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: ConnectionError = InfraError::from(error).into();
        assert!(mapped.is_network(), "expected network error, got {mapped:?}");
    }
}
