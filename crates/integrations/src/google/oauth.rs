//! Google OAuth: consent URL, code exchange, token refresh.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::GoogleError;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// The credential set sealed into a connection's encrypted envelope.
///
/// Never persisted or logged in plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl StoredCredentials {
    /// Whether the access token is expired or about to expire
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::minutes(5) >= self.expires_at
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl TokenResponse {
    /// Fold a token response into stored credentials, keeping the previous
    /// refresh token when Google omits it.
    pub fn into_credentials(
        self,
        previous_refresh: Option<String>,
        now: DateTime<Utc>,
    ) -> StoredCredentials {
        StoredCredentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: now + Duration::seconds(self.expires_in),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// OAuth client for the calendar consent flow
pub struct GoogleOAuthClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

impl GoogleOAuthClient {
    pub fn new(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
            client_secret,
            redirect_url,
        }
    }

    /// Consent URL for the calendar read scope
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            AUTH_ENDPOINT,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_url),
            urlencoding::encode(CALENDAR_SCOPE),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, GoogleError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_url.as_str()),
        ];

        self.token_request(&params).await
    }

    /// Refresh an access token.
    ///
    /// An `invalid_grant` answer means the user revoked access; callers
    /// must flag the connection for re-authorization.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, GoogleError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        self.token_request(&params).await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, GoogleError> {
        let response = self.client.post(TOKEN_ENDPOINT).form(params).send().await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
                if err.error == "invalid_grant" {
                    return Err(GoogleError::TokenRevoked);
                }
            }
            return Err(GoogleError::from_status(status, &body));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GoogleError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_authorize_url_carries_state_and_scope() {
        let oauth = GoogleOAuthClient::new(
            "client-id".to_string(),
            "secret".to_string(),
            "https://app.example.com/callback".to_string(),
        );

        let url = oauth.authorize_url("xyzzy");
        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("state=xyzzy"));
        assert!(url.contains("calendar.readonly"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_token_response_keeps_previous_refresh_token() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let response = TokenResponse {
            access_token: "new-access".to_string(),
            refresh_token: None,
            expires_in: 3600,
        };

        let creds = response.into_credentials(Some("old-refresh".to_string()), now);
        assert_eq!(creds.access_token, "new-access");
        assert_eq!(creds.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(creds.expires_at, now + Duration::hours(1));
    }

    #[test]
    fn test_needs_refresh_buffer() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let creds = StoredCredentials {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: now + Duration::minutes(3),
        };
        assert!(creds.needs_refresh(now));

        let creds = StoredCredentials {
            expires_at: now + Duration::minutes(10),
            ..creds
        };
        assert!(!creds.needs_refresh(now));
    }
}
