use axum::{Router, routing::get};

pub mod catalog;
pub mod clients;
pub mod common;
pub mod devis;
pub mod expenses;
pub mod invoices;
pub mod notifications;
pub mod payments;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/notifications", notifications::router())
        .nest("/devis", devis::router())
        .nest("/invoices", invoices::router())
        .nest("/payments", payments::router())
        .nest("/clients", clients::router())
        .nest("/expenses", expenses::router())
        .nest("/catalog", catalog::router())
}
