pub mod live_rows;
pub mod response;
pub mod sentry;
