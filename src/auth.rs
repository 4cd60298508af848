use chrono::Utc;
use google_sheets4::{hyper, hyper_rustls, oauth2, Sheets};
use thiserror::Error;
use tracing::{debug, info};

use crate::cfg::{Credentials, OAuth2Token};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub type HttpsConnector = hyper_rustls::HttpsConnector<hyper::client::HttpConnector>;
pub type SheetsHub = Sheets<HttpsConnector>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTPS connector could not load root certificates: {0}")]
    Connector(#[source] std::io::Error),
    #[error("service account authenticator could not be built: {0}")]
    ServiceAccount(#[source] std::io::Error),
    #[error("service account token request failed: {0}")]
    Token(#[source] oauth2::Error),
    #[error("OAuth2 access token expired at {0}; no refresh flow is available")]
    TokenExpired(chrono::DateTime<Utc>),
    #[error("unsupported OAuth2 token type {0:?}, expected Bearer")]
    UnsupportedTokenType(String),
}

/// Builds a Sheets hub authorized by the configured credential scheme.
pub async fn create_sheets_hub(credentials: &Credentials) -> Result<SheetsHub, AuthError> {
    info!("Initializing Google Sheets authentication");

    match credentials {
        Credentials::ServiceAccount { email, private_key } => {
            debug!("Using service account {}", email);
            let key = oauth2::ServiceAccountKey {
                key_type: Some("service_account".to_string()),
                project_id: None,
                private_key_id: None,
                private_key: private_key.clone(),
                client_email: email.clone(),
                client_id: None,
                auth_uri: None,
                token_uri: GOOGLE_TOKEN_URI.to_string(),
                auth_provider_x509_cert_url: None,
                client_x509_cert_url: None,
            };
            let auth = oauth2::ServiceAccountAuthenticator::builder(key)
                .build()
                .await
                .map_err(AuthError::ServiceAccount)?;

            // Fail here on bad key material rather than on the first API call.
            auth.token(&[SHEETS_SCOPE]).await.map_err(AuthError::Token)?;

            Ok(Sheets::new(https_client()?, auth))
        }
        Credentials::OAuth2(token) => {
            let access_token = static_access_token(token)?;
            debug!("Using pre-issued OAuth2 token for client {}", token.client_id);
            Ok(Sheets::new(https_client()?, access_token))
        }
    }
}

fn https_client() -> Result<hyper::Client<HttpsConnector>, AuthError> {
    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(AuthError::Connector)?
        .https_or_http()
        .enable_http1()
        .build();
    Ok(hyper::Client::builder().build::<_, hyper::Body>(https))
}

/// Validates a pre-issued token and returns the bearer string to send as-is.
pub fn static_access_token(token: &OAuth2Token) -> Result<String, AuthError> {
    if !token.token_type.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::UnsupportedTokenType(token.token_type.clone()));
    }
    if let Some(expiry) = token.expiry {
        if expiry <= Utc::now() {
            return Err(AuthError::TokenExpired(expiry));
        }
    }
    Ok(token.access_token.clone())
}
