pub mod csv;
pub mod request_feed;
