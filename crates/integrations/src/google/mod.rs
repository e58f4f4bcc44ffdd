//! Google Calendar provider adapter: OAuth and event fetching.

mod client;
mod error;
mod oauth;

pub use client::{EventsPage, GoogleCalendarClient, ProviderCalendar, ProviderEvent};
pub use error::GoogleError;
pub use oauth::{GoogleOAuthClient, StoredCredentials, TokenResponse};
