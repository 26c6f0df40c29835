use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::money;
use fabdesk_core::{DomainError, ExpenseId, UserId, round2};

/// Money spent by the shop (rent, raw stock, tooling, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    pub amount: Decimal,
    /// Free-form grouping label, compared exactly.
    pub category: String,
    pub date: DateTime<Utc>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    /// Defaults to the time of recording.
    pub date: Option<DateTime<Utc>>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePatch {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

fn required(field: &str, value: &str) -> Result<String, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn positive_amount(amount: Decimal) -> Result<Decimal, DomainError> {
    let amount = round2(amount);
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation("expense amount must be greater than 0"));
    }
    Ok(amount)
}

impl Expense {
    pub fn create(
        id: ExpenseId,
        new: NewExpense,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            description: required("description", &new.description)?,
            amount: positive_amount(new.amount)?,
            category: required("category", &new.category)?,
            date: new.date.unwrap_or(now),
            reference: new.reference,
            notes: new.notes,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Validates the whole patch before touching any field.
    pub fn update(&mut self, patch: ExpensePatch, now: DateTime<Utc>) -> Result<(), DomainError> {
        let description = patch
            .description
            .as_deref()
            .map(|d| required("description", d))
            .transpose()?;
        let category = patch
            .category
            .as_deref()
            .map(|c| required("category", c))
            .transpose()?;
        let amount = patch.amount.map(positive_amount).transpose()?;

        if let Some(description) = description {
            self.description = description;
        }
        if let Some(category) = category {
            self.category = category;
        }
        if let Some(amount) = amount {
            self.amount = amount;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if patch.reference.is_some() {
            self.reference = patch.reference;
        }
        if patch.notes.is_some() {
            self.notes = patch.notes;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Listing criteria. Date bounds are inclusive and apply to the expense date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        self.category.as_deref().is_none_or(|c| expense.category == c)
            && self.date_from.is_none_or(|from| expense.date >= from)
            && self.date_to.is_none_or(|to| expense.date <= to)
    }
}

/// Totals over a set of expenses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseStats {
    pub total_amount: Decimal,
    pub count: usize,
    pub by_category: BTreeMap<String, Decimal>,
}

impl ExpenseStats {
    pub fn compute(expenses: &[Expense]) -> Self {
        let mut by_category: BTreeMap<String, Decimal> = BTreeMap::new();
        for e in expenses {
            *by_category.entry(e.category.clone()).or_default() += e.amount;
        }
        Self {
            total_amount: round2(money::sum(expenses.iter().map(|e| e.amount))),
            count: expenses.len(),
            by_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn new_expense(category: &str, amount: Decimal) -> NewExpense {
        NewExpense {
            description: "Plaques MDF".into(),
            amount,
            category: category.into(),
            date: None,
            reference: None,
            notes: None,
        }
    }

    fn expense(category: &str, amount: Decimal) -> Expense {
        Expense::create(ExpenseId::new(), new_expense(category, amount), UserId::new(), Utc::now()).unwrap()
    }

    #[test]
    fn create_defaults_the_date_and_trims_fields() {
        let now = Utc::now();
        let mut new = new_expense("  Matières  ", dec!(120.456));
        new.description = "  Plaques MDF ".into();
        let e = Expense::create(ExpenseId::new(), new, UserId::new(), now).unwrap();

        assert_eq!(e.date, now);
        assert_eq!(e.category, "Matières");
        assert_eq!(e.description, "Plaques MDF");
        assert_eq!(e.amount, dec!(120.46));
    }

    #[test]
    fn create_rejects_missing_fields_and_bad_amounts() {
        let mut blank = new_expense("Loyer", dec!(10));
        blank.description = " ".into();
        assert_eq!(
            Expense::create(ExpenseId::new(), blank, UserId::new(), Utc::now()),
            Err(DomainError::validation("description is required"))
        );

        assert_eq!(
            Expense::create(ExpenseId::new(), new_expense("", dec!(10)), UserId::new(), Utc::now()),
            Err(DomainError::validation("category is required"))
        );

        for amount in [dec!(0), dec!(-3), dec!(0.004)] {
            assert_eq!(
                Expense::create(ExpenseId::new(), new_expense("Loyer", amount), UserId::new(), Utc::now()),
                Err(DomainError::validation("expense amount must be greater than 0"))
            );
        }
    }

    #[test]
    fn invalid_patch_leaves_the_expense_untouched() {
        let mut e = expense("Loyer", dec!(800));
        let before = e.clone();
        let err = e
            .update(
                ExpensePatch {
                    description: Some("Loyer avril".into()),
                    amount: Some(dec!(-1)),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(e, before);

        e.update(
            ExpensePatch {
                amount: Some(dec!(850)),
                notes: Some("révisé".into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(e.amount, dec!(850));
        assert_eq!(e.category, "Loyer");
        assert_eq!(e.notes.as_deref(), Some("révisé"));
    }

    #[test]
    fn filter_matches_category_and_inclusive_dates() {
        let mut e = expense("Outillage", dec!(45));
        e.date = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();

        let day = |d: u32| Utc.with_ymd_and_hms(2026, 3, d, 12, 0, 0).unwrap();
        assert!(ExpenseFilter::default().matches(&e));
        assert!(
            ExpenseFilter {
                category: Some("Outillage".into()),
                date_from: Some(day(10)),
                date_to: Some(day(10)),
            }
            .matches(&e)
        );
        assert!(
            !ExpenseFilter {
                category: Some("outillage".into()),
                ..Default::default()
            }
            .matches(&e)
        );
        assert!(
            !ExpenseFilter {
                date_from: Some(day(11)),
                ..Default::default()
            }
            .matches(&e)
        );
    }

    #[test]
    fn stats_group_by_category() {
        let expenses = vec![
            expense("Loyer", dec!(800)),
            expense("Matières", dec!(120.50)),
            expense("Matières", dec!(79.50)),
        ];
        let stats = ExpenseStats::compute(&expenses);
        assert_eq!(stats.total_amount, dec!(1000));
        assert_eq!(stats.count, 3);
        assert_eq!(stats.by_category["Matières"], dec!(200));
        assert_eq!(stats.by_category["Loyer"], dec!(800));
        assert_eq!(ExpenseStats::compute(&[]), ExpenseStats::default());
    }
}
