use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::info;

use crate::config::db::{ConnectionMode, DbConfig};
use crate::error::DbError;
use crate::infra::db::core::{redact_secrets, sanitize_url, Connected, ConnectionProvider};
use crate::infra::db::drivers::{RemoteDriver, SeaOrmRemoteDriver};

// RFC 3986 unreserved characters stay literal.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Primary URL with `authToken=<token>` appended when a token is configured.
pub fn remote_url(primary_url: &str, auth_token: Option<&str>) -> String {
    let Some(token) = auth_token else {
        return primary_url.to_string();
    };
    let separator = if primary_url.contains('?') { '&' } else { '?' };
    format!(
        "{primary_url}{separator}authToken={}",
        utf8_percent_encode(token, QUERY_VALUE)
    )
}

/// Connects directly to the primary. No local resources are allocated.
#[derive(Debug, Default)]
pub struct RemoteOnlyProvider<R = SeaOrmRemoteDriver> {
    driver: R,
}

impl<R> RemoteOnlyProvider<R> {
    pub fn new(driver: R) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &R {
        &self.driver
    }
}

#[async_trait]
impl<R: RemoteDriver> ConnectionProvider for RemoteOnlyProvider<R> {
    fn mode(&self) -> ConnectionMode {
        ConnectionMode::RemoteOnly
    }

    async fn connect(&self, config: &DbConfig) -> Result<Connected, DbError> {
        let token = config.auth_token_value();
        let url = remote_url(config.primary_url(), token);
        let conn = self.driver.open_remote(&url).await.map_err(|source| {
            let encoded = token.map(|t| utf8_percent_encode(t, QUERY_VALUE).to_string());
            let secrets = [token.unwrap_or_default(), encoded.as_deref().unwrap_or_default()];
            DbError::ConnectionOpen(redact_secrets(source, &secrets))
        })?;

        info!("remote=ready url={}", sanitize_url(&url));
        Ok(Connected::remote(conn))
    }
}
