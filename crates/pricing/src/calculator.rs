//! Line-item pricing.
//!
//! `calculate_line` is a pure function of its input and the price tables: no
//! clock, no IO. Money is rounded to 2 decimals, half away from zero.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::machine::Measure;
use fabdesk_core::money::{CURRENCY, format_amount, format_quantity};
use fabdesk_core::{DomainError, MachineType, MaterialId, round2};

use crate::{MachinePricing, Material};

/// A line as requested by the operator, before pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub machine_type: MachineType,
    pub minutes: Option<Decimal>,
    pub meters: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub material_id: Option<MaterialId>,
}

impl LineInput {
    pub fn new(machine_type: MachineType) -> Self {
        Self {
            machine_type,
            minutes: None,
            meters: None,
            quantity: None,
            material_id: None,
        }
    }

    pub fn minutes(mut self, value: Decimal) -> Self {
        self.minutes = Some(value);
        self
    }

    pub fn meters(mut self, value: Decimal) -> Self {
        self.meters = Some(value);
        self
    }

    pub fn quantity(mut self, value: Decimal) -> Self {
        self.quantity = Some(value);
        self
    }

    pub fn material(mut self, id: MaterialId) -> Self {
        self.material_id = Some(id);
        self
    }

    fn measure_value(&self) -> Option<Decimal> {
        match self.machine_type.measure() {
            Measure::Minutes => self.minutes,
            Measure::Meters => self.meters,
            Measure::Quantity => self.quantity,
        }
    }
}

/// Result of pricing a line. This is what a quote line snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub machine_type: MachineType,
    /// Value of the measure the machine bills by (minutes, meters or units).
    pub measure: Decimal,
    pub unit_price: Decimal,
    /// Material that was resolved and billed. `None` when nothing was billed.
    pub material_id: Option<MaterialId>,
    pub material_cost: Decimal,
    pub line_total: Decimal,
    pub breakdown: String,
}

/// Read access to the price tables.
pub trait PriceTables {
    fn machine_pricing(&self, machine_type: MachineType) -> Option<&MachinePricing>;

    fn material(&self, id: MaterialId) -> Option<&Material>;
}

/// The subset of the price tables a calculation needs, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot {
    machines: BTreeMap<MachineType, MachinePricing>,
    materials: HashMap<MaterialId, Material>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_machine(mut self, pricing: MachinePricing) -> Self {
        self.machines.insert(pricing.machine_type, pricing);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.materials.insert(material.id, material);
        self
    }
}

impl PriceTables for PriceSnapshot {
    fn machine_pricing(&self, machine_type: MachineType) -> Option<&MachinePricing> {
        self.machines.get(&machine_type)
    }

    fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }
}

/// Price one line.
///
/// - CNC: `minutes × unit price`
/// - LASER: `minutes × unit price + material price` (material only when it
///   resolves to an active row, otherwise 0)
/// - CHAMPS: `meters × unit price`
/// - PANNEAUX: `quantity × unit price`
pub fn calculate_line<T>(input: &LineInput, tables: &T) -> Result<PricedLine, DomainError>
where
    T: PriceTables + ?Sized,
{
    let machine_type = input.machine_type;
    let measure = machine_type.measure();

    let value = match input.measure_value() {
        Some(v) if v > Decimal::ZERO => v,
        _ => {
            return Err(DomainError::validation(format!(
                "{} must be greater than 0 for {machine_type}",
                measure.field()
            )));
        }
    };

    let pricing = tables.machine_pricing(machine_type).ok_or_else(|| {
        DomainError::validation(format!("machine_type: no pricing configured for {machine_type}"))
    })?;
    let unit_price = pricing.price_per_unit;
    let unit = machine_type.unit_label();

    let (material_id, material_cost) = match (machine_type, input.material_id) {
        (MachineType::Laser, Some(id)) => match tables.material(id) {
            Some(material) if material.active => (Some(id), round2(material.price_per_unit)),
            _ => (None, Decimal::ZERO),
        },
        _ => (None, Decimal::ZERO),
    };

    let line_total = round2(value * unit_price + material_cost);

    let work = format!(
        "{} {} × {} {CURRENCY}/{unit}",
        format_quantity(value),
        quantity_label(machine_type),
        format_amount(unit_price),
    );
    let breakdown = if machine_type == MachineType::Laser {
        format!(
            "({work}) + {} {CURRENCY} material = {} {CURRENCY}",
            format_amount(material_cost),
            format_amount(line_total)
        )
    } else {
        format!("{work} = {} {CURRENCY}", format_amount(line_total))
    };

    Ok(PricedLine {
        machine_type,
        measure: value,
        unit_price,
        material_id,
        material_cost,
        line_total,
        breakdown,
    })
}

fn quantity_label(machine_type: MachineType) -> &'static str {
    match machine_type.measure() {
        Measure::Minutes => "min",
        Measure::Meters => "m",
        Measure::Quantity => "units",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use crate::NewMaterial;

    fn tables() -> PriceSnapshot {
        MachinePricing::defaults(Utc::now())
            .into_iter()
            .fold(PriceSnapshot::new(), PriceSnapshot::with_machine)
    }

    fn material(price: Decimal) -> Material {
        Material::create(
            MaterialId::new(),
            NewMaterial {
                name: "MDF 3mm".into(),
                price_per_unit: price,
                unit: "plaque".into(),
                description: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn cnc_bills_minutes() {
        let line = calculate_line(&LineInput::new(MachineType::Cnc).minutes(dec!(30)), &tables()).unwrap();
        assert_eq!(line.line_total, dec!(45.00));
        assert_eq!(line.material_cost, Decimal::ZERO);
        assert_eq!(line.breakdown, "30 min × 1.50 TND/min = 45.00 TND");
    }

    #[test]
    fn laser_adds_material_cost() {
        let mdf = material(dec!(12.5));
        let t = tables().with_material(mdf.clone());
        let line = calculate_line(
            &LineInput::new(MachineType::Laser).minutes(dec!(10)).material(mdf.id),
            &t,
        )
        .unwrap();

        assert_eq!(line.unit_price, dec!(2.00));
        assert_eq!(line.material_cost, dec!(12.50));
        assert_eq!(line.line_total, dec!(32.50));
        assert_eq!(line.material_id, Some(mdf.id));
        assert_eq!(line.breakdown, "(10 min × 2.00 TND/min) + 12.50 TND material = 32.50 TND");
    }

    #[test]
    fn laser_with_unknown_or_inactive_material_costs_nothing_extra() {
        let mut mdf = material(dec!(12.5));
        mdf.deactivate();
        let t = tables().with_material(mdf.clone());

        for id in [mdf.id, MaterialId::new()] {
            let line = calculate_line(&LineInput::new(MachineType::Laser).minutes(dec!(10)).material(id), &t).unwrap();
            assert_eq!(line.material_cost, Decimal::ZERO);
            assert_eq!(line.material_id, None);
            assert_eq!(line.line_total, dec!(20.00));
        }
    }

    #[test]
    fn material_is_ignored_outside_laser() {
        let mdf = material(dec!(12.5));
        let t = tables().with_material(mdf.clone());
        let line = calculate_line(&LineInput::new(MachineType::Cnc).minutes(dec!(2)).material(mdf.id), &t).unwrap();
        assert_eq!(line.material_cost, Decimal::ZERO);
        assert_eq!(line.line_total, dec!(3.00));
    }

    #[test]
    fn champs_and_panneaux_use_their_measure() {
        let champs = calculate_line(&LineInput::new(MachineType::Champs).meters(dec!(2.5)), &tables()).unwrap();
        assert_eq!(champs.line_total, dec!(12.50));
        assert_eq!(champs.breakdown, "2.5 m × 5.00 TND/m = 12.50 TND");

        let panneaux = calculate_line(&LineInput::new(MachineType::Panneaux).quantity(dec!(3)), &tables()).unwrap();
        assert_eq!(panneaux.line_total, dec!(75.00));
        assert_eq!(panneaux.breakdown, "3 units × 25.00 TND/unit = 75.00 TND");
    }

    #[test]
    fn missing_or_non_positive_measure_names_the_field() {
        let err = calculate_line(&LineInput::new(MachineType::Champs).minutes(dec!(5)), &tables()).unwrap_err();
        assert_eq!(err, DomainError::validation("meters must be greater than 0 for CHAMPS"));

        let err = calculate_line(&LineInput::new(MachineType::Cnc).minutes(dec!(0)), &tables()).unwrap_err();
        assert_eq!(err, DomainError::validation("minutes must be greater than 0 for CNC"));

        let err = calculate_line(&LineInput::new(MachineType::Panneaux).quantity(dec!(-1)), &tables()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.starts_with("quantity")));
    }

    #[test]
    fn missing_pricing_row_is_a_validation_error() {
        let err = calculate_line(&LineInput::new(MachineType::Cnc).minutes(dec!(1)), &PriceSnapshot::new()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.contains("machine_type")));
    }

    #[test]
    fn totals_round_half_away_from_zero() {
        let t = PriceSnapshot::new().with_machine(
            MachinePricing::new(MachineType::Cnc, dec!(0.333), None, Utc::now()).unwrap(),
        );
        let line = calculate_line(&LineInput::new(MachineType::Cnc).minutes(dec!(15)), &t).unwrap();
        // 15 × 0.333 = 4.995
        assert_eq!(line.line_total, dec!(5.00));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn machine() -> impl Strategy<Value = MachineType> {
            prop::sample::select(MachineType::ALL.to_vec())
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: same input + same tables = same priced line.
            #[test]
            fn calculation_is_pure(
                machine in machine(),
                hundredths in 1i64..1_000_000,
                material_cents in 0i64..100_000,
            ) {
                let value = Decimal::new(hundredths, 2);
                let mdf = material(Decimal::new(material_cents, 2));
                let t = tables().with_material(mdf.clone());
                let input = LineInput {
                    machine_type: machine,
                    minutes: Some(value),
                    meters: Some(value),
                    quantity: Some(value),
                    material_id: Some(mdf.id),
                };

                let a = calculate_line(&input, &t).unwrap();
                let b = calculate_line(&input, &t).unwrap();
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(a.line_total, round2(a.line_total));
                prop_assert!(a.line_total >= Decimal::ZERO);
            }
        }
    }
}
