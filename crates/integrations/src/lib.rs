pub mod google;
pub mod vault;

pub use google::{
    EventsPage, GoogleCalendarClient, GoogleError, GoogleOAuthClient, ProviderCalendar,
    ProviderEvent, StoredCredentials, TokenResponse,
};
pub use vault::CredentialVault;
