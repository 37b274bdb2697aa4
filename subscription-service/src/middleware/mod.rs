//! Request extractors for subscription-service.

pub mod admin;
pub mod requester;

pub use admin::AdminContext;
pub use requester::RequesterContext;
