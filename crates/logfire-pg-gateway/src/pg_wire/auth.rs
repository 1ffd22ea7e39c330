//! Startup and cleartext password authentication

use crate::auth::{AuthGateway, Session};
use crate::errors::classify;
use async_trait::async_trait;
use futures::{Sink, SinkExt};
use pgwire::api::auth::{
    finish_authentication, save_startup_parameters_to_metadata, LoginInfo,
    ServerParameterProvider, StartupHandler,
};
use pgwire::api::{ClientInfo, PgWireConnectionState};
use pgwire::error::{PgWireError, PgWireResult};
use pgwire::messages::response::ErrorResponse;
use pgwire::messages::startup::Authentication;
use pgwire::messages::{PgWireBackendMessage, PgWireFrontendMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Parameters reported to the client once authentication succeeds
#[derive(Debug, Clone)]
pub struct LogfireParameterProvider {
    server_version: String,
}

impl LogfireParameterProvider {
    pub fn new(server_version: impl Into<String>) -> Self {
        Self {
            server_version: server_version.into(),
        }
    }

    pub fn parameters(&self) -> HashMap<String, String> {
        HashMap::from([
            ("server_version".to_string(), self.server_version.clone()),
            ("server_encoding".to_string(), "UTF8".to_string()),
            ("client_encoding".to_string(), "UTF8".to_string()),
            ("DateStyle".to_string(), "ISO, YMD".to_string()),
            ("integer_datetimes".to_string(), "on".to_string()),
        ])
    }
}

impl ServerParameterProvider for LogfireParameterProvider {
    fn server_parameters<C>(&self, _client: &C) -> Option<HashMap<String, String>>
    where
        C: ClientInfo,
    {
        Some(self.parameters())
    }
}

/// Asks for a cleartext password and validates it through the [`AuthGateway`]
pub struct LogfireStartupHandler {
    gateway: Arc<AuthGateway>,
    session: Arc<Session>,
    parameters: Arc<LogfireParameterProvider>,
}

impl LogfireStartupHandler {
    pub fn new(
        gateway: Arc<AuthGateway>,
        session: Arc<Session>,
        parameters: Arc<LogfireParameterProvider>,
    ) -> Self {
        Self {
            gateway,
            session,
            parameters,
        }
    }
}

#[async_trait]
impl StartupHandler for LogfireStartupHandler {
    async fn on_startup<C>(&self, client: &mut C, message: PgWireFrontendMessage) -> PgWireResult<()>
    where
        C: ClientInfo + Sink<PgWireBackendMessage> + Unpin + Send,
        C::Error: std::fmt::Debug,
        PgWireError: From<<C as Sink<PgWireBackendMessage>>::Error>,
    {
        match message {
            PgWireFrontendMessage::Startup(ref startup) => {
                save_startup_parameters_to_metadata(client, startup);
                client.set_state(PgWireConnectionState::AuthenticationInProgress);
                debug!(peer = %self.session.peer(), "Requesting cleartext password");
                client
                    .send(PgWireBackendMessage::Authentication(
                        Authentication::CleartextPassword,
                    ))
                    .await?;
            }
            PgWireFrontendMessage::PasswordMessageFamily(pwd) => {
                let password = pwd.into_password()?.password;
                let user = LoginInfo::from_client_info(client)
                    .user()
                    .map(str::to_string)
                    .unwrap_or_default();

                let credential = match self.gateway.authenticate(&user, &password).await {
                    Ok(credential) => credential,
                    Err(e) => {
                        info!(peer = %self.session.peer(), user = %user, error = %e, "Connection refused");
                        let error = ErrorResponse::from(classify(&e).into_error_info());
                        client.feed(PgWireBackendMessage::ErrorResponse(error)).await?;
                        client.close().await?;
                        return Ok(());
                    }
                };

                self.session
                    .bind(&user, credential)
                    .map_err(crate::errors::to_pg_error)?;
                finish_authentication(client, self.parameters.as_ref()).await?;
                info!(peer = %self.session.peer(), user = %user, "Client authenticated");
            }
            _ => {}
        }
        Ok(())
    }
}
