//! Clients domain module.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod client;

pub use client::{Client, ClientPatch, ContactInfo, NewClient};
