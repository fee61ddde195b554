//! Request and response data structures for the API.

pub mod users;
