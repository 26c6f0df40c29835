use tracing::{info, instrument};

use fabdesk_auth::{Actor, require_admin};
use fabdesk_core::ExpenseId;
use fabdesk_core::money::format_amount;
use fabdesk_events::{Notification, NotificationKind};
use fabdesk_expenses::{Expense, ExpenseFilter, ExpensePatch, ExpenseStats, NewExpense};

use super::{BackOffice, ServiceResult, not_found, now};
use crate::store::StoreTx;

async fn load_expense(tx: &mut dyn StoreTx, id: ExpenseId) -> ServiceResult<Expense> {
    tx.expense(id).await?.ok_or_else(|| not_found("expense"))
}

/// Expenses are admin-only, reads included.
impl BackOffice {
    /// Newest expense date first.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn list_expenses(&self, actor: &Actor, filter: ExpenseFilter) -> ServiceResult<Vec<Expense>> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        Ok(tx.list_expenses(&filter).await?)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn get_expense(&self, actor: &Actor, id: ExpenseId) -> ServiceResult<Expense> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        load_expense(tx.as_mut(), id).await
    }

    #[instrument(skip(self, actor, new), fields(user_id = %actor.user_id), err)]
    pub async fn create_expense(&self, actor: &Actor, new: NewExpense) -> ServiceResult<Expense> {
        require_admin(actor)?;
        let expense = Expense::create(ExpenseId::new(), new, actor.user_id, now())?;

        let mut tx = self.begin().await?;
        tx.save_expense(&expense).await?;
        tx.commit().await?;

        info!(expense_id = %expense.id, amount = %expense.amount, category = %expense.category, "expense created");
        self.notify(
            Notification::new(
                NotificationKind::ExpenseCreated,
                "New expense",
                format!("\"{}\" for {}", expense.description, format_amount(expense.amount)),
            )
            .about("expense", expense.id)
            .by(actor.user_id),
        );
        Ok(expense)
    }

    #[instrument(skip(self, actor, patch), fields(user_id = %actor.user_id), err)]
    pub async fn update_expense(&self, actor: &Actor, id: ExpenseId, patch: ExpensePatch) -> ServiceResult<Expense> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let mut expense = load_expense(tx.as_mut(), id).await?;
        expense.update(patch, now())?;
        tx.save_expense(&expense).await?;
        tx.commit().await?;

        info!(expense_id = %id, "expense updated");
        Ok(expense)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn delete_expense(&self, actor: &Actor, id: ExpenseId) -> ServiceResult<()> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let expense = load_expense(tx.as_mut(), id).await?;
        tx.delete_expense(id).await?;
        tx.commit().await?;

        info!(expense_id = %id, "expense deleted");
        self.notify(
            Notification::new(NotificationKind::ExpenseDeleted, "Expense deleted", expense.description)
                .about("expense", id)
                .by(actor.user_id),
        );
        Ok(())
    }

    /// Total, count and per-category sums over the expenses dated in the window.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn expense_stats(&self, actor: &Actor, filter: ExpenseFilter) -> ServiceResult<ExpenseStats> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let expenses = tx.list_expenses(&filter).await?;
        Ok(ExpenseStats::compute(&expenses))
    }
}
