//! Quotes ("devis") domain module.
//!
//! This crate contains the quote lifecycle and composition rules, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod devis;

pub use devis::{
    AddLine, AddService, CancelDevis, CreateDevis, Devis, DevisCommand, DevisEvent, DevisFilter,
    DevisLine, DevisRecord, DevisService, DevisStatus, MarkInvoiced, RemoveLine, RemoveService,
    RevertToValidated, UpdateNotes, ValidateDevis,
};
