use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fabdesk_core::{ClientId, DomainError};

/// Contact information for a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// A customer of the shop. Owns quotes and invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    #[serde(flatten)]
    pub contact: ContactInfo,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    #[serde(flatten)]
    pub contact: ContactInfo,
    pub notes: Option<String>,
}

/// Partial update. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

fn ensure_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(())
}

impl Client {
    pub fn create(id: ClientId, new: NewClient, now: DateTime<Utc>) -> Result<Self, DomainError> {
        ensure_name(&new.name)?;
        Ok(Self {
            id,
            name: new.name.trim().to_string(),
            contact: new.contact,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, patch: ClientPatch, now: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(name) = &patch.name {
            ensure_name(name)?;
        }

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if patch.phone.is_some() {
            self.contact.phone = patch.phone;
        }
        if patch.email.is_some() {
            self.contact.email = patch.email;
        }
        if patch.address.is_some() {
            self.contact.address = patch.address;
        }
        if patch.notes.is_some() {
            self.notes = patch.notes;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Case-insensitive substring match over name, phone and email.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            Some(self.name.as_str()),
            self.contact.phone.as_deref(),
            self.contact.email.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    /// A client that still owns quotes or invoices cannot be removed.
    pub fn ensure_deletable(&self, devis_count: usize, invoice_count: usize) -> Result<(), DomainError> {
        if devis_count > 0 {
            return Err(DomainError::conflict(format!(
                "cannot delete client with {devis_count} existing quote(s)"
            )));
        }
        if invoice_count > 0 {
            return Err(DomainError::conflict(format!(
                "cannot delete client with {invoice_count} invoice(s)"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::create(
            ClientId::new(),
            NewClient {
                name: "Menuiserie Ben Salah".into(),
                contact: ContactInfo {
                    phone: Some("+216 22 333 444".into()),
                    email: Some("contact@bensalah.tn".into()),
                    address: None,
                },
                notes: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn create_requires_a_name() {
        let err = Client::create(ClientId::new(), NewClient::default(), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("name cannot be empty"));
    }

    #[test]
    fn update_is_partial() {
        let mut c = client();
        c.update(
            ClientPatch {
                address: Some("Sfax".into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(c.name, "Menuiserie Ben Salah");
        assert_eq!(c.contact.address.as_deref(), Some("Sfax"));
        assert_eq!(c.contact.phone.as_deref(), Some("+216 22 333 444"));
    }

    #[test]
    fn update_rejects_blank_name_without_side_effects() {
        let mut c = client();
        let before = c.clone();
        assert!(c
            .update(
                ClientPatch {
                    name: Some(" ".into()),
                    notes: Some("x".into()),
                    ..Default::default()
                },
                Utc::now()
            )
            .is_err());
        assert_eq!(c, before);
    }

    #[test]
    fn search_is_case_insensitive_over_name_phone_email() {
        let c = client();
        assert!(c.matches("ben salah"));
        assert!(c.matches("333"));
        assert!(c.matches("BENSALAH.TN"));
        assert!(!c.matches("sfax"));
    }

    #[test]
    fn client_with_quotes_or_invoices_cannot_be_deleted() {
        let c = client();
        assert!(c.ensure_deletable(0, 0).is_ok());
        assert!(matches!(c.ensure_deletable(2, 0), Err(DomainError::StateConflict(_))));
        assert_eq!(
            c.ensure_deletable(0, 1),
            Err(DomainError::conflict("cannot delete client with 1 invoice(s)"))
        );
    }
}
