//! Machine categories of the workshop and the measure each one is billed by.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Machine category. Each category has exactly one pricing row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineType {
    /// CNC router, billed per minute.
    Cnc,
    /// Laser cutter, billed per minute plus optional material.
    Laser,
    /// Edge banding ("champs"), billed per meter.
    Champs,
    /// Panel cutting, billed per unit.
    Panneaux,
}

/// The quantity a machine category is billed by.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Measure {
    Minutes,
    Meters,
    Quantity,
}

impl Measure {
    /// Field name as used in requests and error messages.
    pub fn field(self) -> &'static str {
        match self {
            Measure::Minutes => "minutes",
            Measure::Meters => "meters",
            Measure::Quantity => "quantity",
        }
    }
}

impl MachineType {
    pub const ALL: [MachineType; 4] = [
        MachineType::Cnc,
        MachineType::Laser,
        MachineType::Champs,
        MachineType::Panneaux,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MachineType::Cnc => "CNC",
            MachineType::Laser => "LASER",
            MachineType::Champs => "CHAMPS",
            MachineType::Panneaux => "PANNEAUX",
        }
    }

    pub fn measure(self) -> Measure {
        match self {
            MachineType::Cnc | MachineType::Laser => Measure::Minutes,
            MachineType::Champs => Measure::Meters,
            MachineType::Panneaux => Measure::Quantity,
        }
    }

    /// Short unit label used in price descriptions and breakdowns.
    pub fn unit_label(self) -> &'static str {
        match self.measure() {
            Measure::Minutes => "min",
            Measure::Meters => "m",
            Measure::Quantity => "unit",
        }
    }
}

impl core::fmt::Display for MachineType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CNC" => Ok(MachineType::Cnc),
            "LASER" => Ok(MachineType::Laser),
            "CHAMPS" => Ok(MachineType::Champs),
            "PANNEAUX" => Ok(MachineType::Panneaux),
            _ => Err(DomainError::validation(format!("unknown machine type: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("laser".parse::<MachineType>().unwrap(), MachineType::Laser);
        assert_eq!(" PANNEAUX ".parse::<MachineType>().unwrap(), MachineType::Panneaux);
    }

    #[test]
    fn unknown_machine_type_is_a_validation_error() {
        let err = "PLASMA".parse::<MachineType>().unwrap_err();
        assert_eq!(err, DomainError::validation("unknown machine type: PLASMA"));
    }

    #[test]
    fn each_machine_bills_by_its_measure() {
        assert_eq!(MachineType::Cnc.measure(), Measure::Minutes);
        assert_eq!(MachineType::Laser.measure(), Measure::Minutes);
        assert_eq!(MachineType::Champs.measure(), Measure::Meters);
        assert_eq!(MachineType::Panneaux.measure(), Measure::Quantity);
    }
}
