pub mod api_keys;
pub mod auth;
pub mod billing_periods;
pub mod calendars;
pub mod config_io;
pub mod connections;
pub mod events;
pub mod health;
pub mod invoices;
pub mod oauth_client;
pub mod projects;
pub mod prometheus;
pub mod rules;
pub mod sync;
pub mod time_entries;
