//! Human-readable document references: `<PREFIX>-<year>-<4-digit sequence>`.
//!
//! The sequence restarts every year. The next value is derived from the
//! references already issued for that year, so callers must read them inside
//! the same store transaction that inserts the new document.

use serde::{Deserialize, Serialize};

use crate::DomainError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    Devis,
    Invoice,
}

impl ReferenceKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ReferenceKind::Devis => "DEV",
            ReferenceKind::Invoice => "INV",
        }
    }

    /// Prefix shared by every reference issued in `year`, e.g. `DEV-2026-`.
    pub fn year_prefix(self, year: i32) -> String {
        format!("{}-{}-", self.prefix(), year)
    }

    pub fn format(self, year: i32, sequence: u32) -> String {
        format!("{}{:04}", self.year_prefix(year), sequence)
    }

    /// Extract the sequence number of a reference issued in `year`.
    pub fn parse_sequence(self, year: i32, reference: &str) -> Option<u32> {
        reference
            .strip_prefix(&self.year_prefix(year))
            .and_then(|seq| seq.parse::<u32>().ok())
    }

    /// Next reference for `year`, given the references already issued.
    ///
    /// Uses the highest issued sequence rather than a count so that deleting a
    /// document never causes a reference to be handed out twice.
    pub fn next<'a, I>(self, year: i32, existing: I) -> Result<String, DomainError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let last = existing
            .into_iter()
            .filter_map(|r| self.parse_sequence(year, r))
            .max()
            .unwrap_or(0);
        let sequence = last.checked_add(1).ok_or_else(|| {
            DomainError::conflict(format!("{} sequence exhausted for {year}", self.prefix()))
        })?;
        Ok(self.format(year, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reference_of_the_year() {
        assert_eq!(ReferenceKind::Devis.next(2026, []).unwrap(), "DEV-2026-0001");
    }

    #[test]
    fn sequence_restarts_each_year() {
        let existing = ["INV-2025-0007", "INV-2025-0008"];
        assert_eq!(ReferenceKind::Invoice.next(2026, existing).unwrap(), "INV-2026-0001");
        assert_eq!(ReferenceKind::Invoice.next(2025, existing).unwrap(), "INV-2025-0009");
    }

    #[test]
    fn gaps_never_reissue_a_reference() {
        let existing = ["DEV-2026-0001", "DEV-2026-0003"];
        assert_eq!(ReferenceKind::Devis.next(2026, existing).unwrap(), "DEV-2026-0004");
    }

    #[test]
    fn foreign_prefixes_are_ignored() {
        let existing = ["INV-2026-0005", "DEV-2026-garbage"];
        assert_eq!(ReferenceKind::Devis.next(2026, existing).unwrap(), "DEV-2026-0001");
    }

    #[test]
    fn exhausted_sequence_is_a_conflict() {
        let existing = ["DEV-2026-4294967295"];
        assert_eq!(
            ReferenceKind::Devis.next(2026, existing),
            Err(DomainError::conflict("DEV sequence exhausted for 2026"))
        );
    }
}
