//! Expenses domain module.
//!
//! Money going out of the shop, kept next to the invoices so admins can
//! compare both sides. Pure domain logic (no IO, no HTTP, no storage).

pub mod expense;

pub use expense::{Expense, ExpenseFilter, ExpensePatch, ExpenseStats, NewExpense};
