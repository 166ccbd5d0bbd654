//! Request and response bodies of the HTTP surface. Responses are wrapped
//! in the `{code, message, data, timestamp}` envelope by the handlers.

pub mod admin;
pub mod auth;
pub mod service;
