//! Sign-in state machine.
//!
//! ```text
//! Unauthenticated → CheckingAccess ─┬─► Authenticated
//!                                   └─► LoginRequired → LoggingIn ─┬─► Authenticated
//!                                                                  └─► LoginFailed
//! ```
//!
//! On `Authenticated` the session is left on the probe page.

use serde::Serialize;

use crate::config::{Delays, Selectors};
use crate::error::{HarvestError, HarvestResult};
use crate::session::Session;
use crate::types::Credentials;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    CheckingAccess,
    LoginRequired,
    LoggingIn,
    Authenticated,
    LoginFailed(String),
}

/// Drives a session until it can read full text, or fails.
pub struct Authenticator<'a> {
    selectors: &'a Selectors,
    delays: &'a Delays,
}

impl<'a> Authenticator<'a> {
    pub fn new(selectors: &'a Selectors, delays: &'a Delays) -> Self {
        Self { selectors, delays }
    }

    /// Run the state machine against `probe_url`.
    ///
    /// Returns `Ok(AuthState::Authenticated)` or a `Credential` error.
    pub async fn authenticate(
        &self,
        session: &mut Session,
        probe_url: &str,
        credentials: Option<&Credentials>,
    ) -> HarvestResult<AuthState> {
        let mut state = AuthState::Unauthenticated;
        let mut attempted = false;

        loop {
            tracing::debug!("Auth state: {state:?}");
            state = match state {
                AuthState::Unauthenticated => AuthState::CheckingAccess,
                AuthState::CheckingAccess => {
                    if self.check_access(session, probe_url).await? {
                        AuthState::Authenticated
                    } else if attempted {
                        AuthState::LoginFailed("access still denied after signing in".into())
                    } else {
                        AuthState::LoginRequired
                    }
                }
                AuthState::LoginRequired => match credentials {
                    Some(_) => AuthState::LoggingIn,
                    None => AuthState::LoginFailed(
                        "full text requires sign-in and no credentials were supplied".into(),
                    ),
                },
                AuthState::LoggingIn => {
                    attempted = true;
                    // LoginRequired only moves here with credentials present.
                    let Some(creds) = credentials else {
                        return Err(HarvestError::Credential("no credentials".into()));
                    };
                    self.log_in(session, probe_url, creds).await?
                }
                AuthState::Authenticated => {
                    tracing::info!("Full-text access confirmed");
                    return Ok(AuthState::Authenticated);
                }
                AuthState::LoginFailed(reason) => {
                    return Err(HarvestError::Credential(reason));
                }
            };
        }
    }

    /// Navigate to the probe page and look for the access control.
    async fn check_access(&self, session: &mut Session, probe_url: &str) -> HarvestResult<bool> {
        session.navigate(probe_url).await?;
        present(session.locate(&self.selectors.access_control).await)
    }

    /// Submit the sign-in form and decide where to go next.
    async fn log_in(
        &self,
        session: &mut Session,
        probe_url: &str,
        credentials: &Credentials,
    ) -> HarvestResult<AuthState> {
        tracing::info!("Signing in as {}", credentials.username);
        session.navigate(probe_url).await?;

        match self.submit_form(session, credentials).await {
            Ok(()) => {
                session.pause(self.delays.login_redirect()).await;
                session.pause(self.delays.recheck_settle()).await;
                Ok(AuthState::CheckingAccess)
            }
            Err(HarvestError::ElementNotFound(what)) => {
                // No sign-in form: possibly already signed in.
                tracing::warn!("Sign-in control missing ({what}); re-probing");
                session.pause(self.delays.login_grace()).await;
                let trigger = session.locate(&self.selectors.full_text_trigger).await;
                if present(trigger)? {
                    tracing::info!("Full-text trigger present, treating session as signed in");
                    Ok(AuthState::Authenticated)
                } else {
                    Ok(AuthState::LoginFailed(format!(
                        "neither sign-in form nor full-text access found ({what})"
                    )))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn submit_form(&self, session: &mut Session, credentials: &Credentials) -> HarvestResult<()> {
        let sign_in = session.locate(&self.selectors.sign_in_link).await?;
        session.click(sign_in).await?;

        let username = session.locate(&self.selectors.username_field).await?;
        session.type_text(username, &credentials.username).await?;
        let password = session.locate(&self.selectors.password_field).await?;
        session.type_text(password, &credentials.password).await?;

        let submit = session.locate(&self.selectors.login_submit).await?;
        session.click(submit).await
    }
}

/// Map a locate result to presence, keeping non-lookup failures as errors.
fn present<T>(result: HarvestResult<T>) -> HarvestResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(HarvestError::ElementNotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
