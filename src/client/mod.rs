// ABOUTME: Typed command surface (C7) and connection factory for the RESP client
// ABOUTME: Exports `Client` and `ClientBuilder`, the crate's primary entry points

pub mod builder;
pub mod facade;

pub use builder::ClientBuilder;
pub use facade::Client;
