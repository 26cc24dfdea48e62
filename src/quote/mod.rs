pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod retry;
pub mod search;
pub mod transport;
