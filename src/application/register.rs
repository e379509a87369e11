use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

use crate::domain::{
    CashRegister, Cents, Expense, ExpenseId, ExpenseUpdate, HistoryEntry, HistoryKind, NewExpense,
    projected_balance,
};
use crate::storage::register;

use super::service::rejected;
use super::{AppError, RetailService};

impl RetailService {
    // ========================
    // Register
    // ========================

    pub async fn register(&self) -> Result<CashRegister, AppError> {
        let mut conn = self.repo.acquire().await?;
        register::get(&mut conn)
            .await?
            .ok_or(AppError::RegisterMissing)
    }

    /// Put money into the register.
    #[instrument(skip(self))]
    pub async fn deposit(&self, amount: Cents, note: Option<&str>) -> Result<CashRegister, AppError> {
        validate_amount(amount)?;

        let mut tx = self.repo.begin().await?;
        let current = claim_register(&mut tx).await?;
        if current.money.checked_add(amount).is_none() {
            return Err(rejected(AppError::InvalidAmount(format!(
                "Deposit of {} would overflow the register balance",
                amount
            ))));
        }
        let money = register::adjust_money(&mut tx, amount).await?;
        register::insert_history(&mut tx, HistoryKind::Deposit, amount, None, note, Utc::now())
            .await?;
        let updated = load_register(&mut tx).await?;
        tx.commit().await?;

        info!(amount, money, "Deposit recorded");
        Ok(updated)
    }

    /// Take money out of the register. The balance never goes negative.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, amount: Cents, note: Option<&str>) -> Result<CashRegister, AppError> {
        validate_amount(amount)?;

        let mut tx = self.repo.begin().await?;
        let current = claim_register(&mut tx).await?;
        ensure_can_pay(&current, amount)?;

        let money = register::adjust_money(&mut tx, -amount).await?;
        register::insert_history(&mut tx, HistoryKind::Withdrawal, amount, None, note, Utc::now())
            .await?;
        let updated = load_register(&mut tx).await?;
        tx.commit().await?;

        info!(amount, money, "Withdrawal recorded");
        Ok(updated)
    }

    /// Register funding events, oldest first.
    pub async fn register_history(
        &self,
        include_deleted: bool,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(register::list_history(&mut conn, include_deleted).await?)
    }

    /// History rows recorded for one expense, deleted ones included.
    pub async fn expense_history(&self, expense_id: ExpenseId) -> Result<Vec<HistoryEntry>, AppError> {
        let mut conn = self.repo.acquire().await?;
        if register::get_expense(&mut conn, expense_id).await?.is_none() {
            return Err(AppError::ExpenseNotFound(expense_id));
        }
        Ok(register::history_for_expense(&mut conn, expense_id).await?)
    }

    // ========================
    // Expenses
    // ========================

    /// Record an expense. One paid from the register is charged to it right away.
    #[instrument(skip(self, input), fields(title = %input.title, price = input.price))]
    pub async fn create_expense(&self, input: NewExpense) -> Result<Expense, AppError> {
        validate_expense(&input)?;

        let mut tx = self.repo.begin().await?;
        let current = claim_register(&mut tx).await?;
        ensure_can_pay(&current, input.register_charge())?;

        let id = register::insert_expense(&mut tx, &input, Utc::now()).await?;
        let money = charge(&mut tx, id, input.register_charge()).await?;
        let created = load_expense(&mut tx, id).await?;
        tx.commit().await?;

        info!(expense_id = id, money, "Expense created");
        Ok(created)
    }

    /// Replace an expense: the old charge is refunded and its history row
    /// dropped, then the new one is charged under a fresh history row with a
    /// new id and timestamp. The resulting balance is checked before anything
    /// is written.
    #[instrument(skip(self, input))]
    pub async fn update_expense(
        &self,
        expense_id: ExpenseId,
        input: ExpenseUpdate,
    ) -> Result<Expense, AppError> {
        validate_expense(&input)?;

        let mut tx = self.repo.begin().await?;
        let current = claim_register(&mut tx).await?;
        let old = live_expense(&mut tx, expense_id).await?;

        let projected = projected_balance(current.money, &old, &input);
        if projected < 0 {
            return Err(rejected(AppError::InsufficientRegisterBalance {
                balance: current.money + old.register_charge(),
                required: input.register_charge(),
            }));
        }

        if old.register_charge() > 0 {
            register::adjust_money(&mut tx, old.register_charge()).await?;
        }
        register::delete_history_for_expense(&mut tx, expense_id).await?;
        register::update_expense(&mut tx, expense_id, &input).await?;
        let money = charge(&mut tx, expense_id, input.register_charge()).await?;
        let updated = load_expense(&mut tx, expense_id).await?;
        tx.commit().await?;

        info!(expense_id, money, "Expense updated");
        Ok(updated)
    }

    /// Soft-delete an expense and refund what it took from the register.
    #[instrument(skip(self))]
    pub async fn delete_expense(&self, expense_id: ExpenseId) -> Result<Expense, AppError> {
        let mut tx = self.repo.begin().await?;
        claim_register(&mut tx).await?;
        let expense = live_expense(&mut tx, expense_id).await?;

        let money = register::adjust_money(&mut tx, expense.register_charge()).await?;
        register::set_history_deleted_for_expense(&mut tx, expense_id, true).await?;
        register::set_expense_deleted(&mut tx, expense_id, true).await?;
        let deleted = load_expense(&mut tx, expense_id).await?;
        tx.commit().await?;

        info!(expense_id, money, "Expense deleted");
        Ok(deleted)
    }

    /// Bring a deleted expense back, charging the register again.
    #[instrument(skip(self))]
    pub async fn restore_expense(&self, expense_id: ExpenseId) -> Result<Expense, AppError> {
        let mut tx = self.repo.begin().await?;
        let current = claim_register(&mut tx).await?;
        let expense = register::get_expense(&mut tx, expense_id)
            .await?
            .ok_or_else(|| rejected(AppError::ExpenseNotFound(expense_id)))?;
        if !expense.deleted {
            return Err(rejected(AppError::ExpenseNotDeleted(expense_id)));
        }
        ensure_can_pay(&current, expense.register_charge())?;

        let money = register::adjust_money(&mut tx, -expense.register_charge()).await?;
        register::set_history_deleted_for_expense(&mut tx, expense_id, false).await?;
        register::set_expense_deleted(&mut tx, expense_id, false).await?;
        let restored = load_expense(&mut tx, expense_id).await?;
        tx.commit().await?;

        info!(expense_id, money, "Expense restored");
        Ok(restored)
    }

    pub async fn get_expense(&self, expense_id: ExpenseId) -> Result<Expense, AppError> {
        let mut conn = self.repo.acquire().await?;
        load_expense(&mut conn, expense_id).await
    }

    pub async fn list_expenses(&self, include_deleted: bool) -> Result<Vec<Expense>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(register::list_expenses(&mut conn, include_deleted).await?)
    }
}

/// Take the register's write lock and read the balance under it.
async fn claim_register(conn: &mut SqliteConnection) -> Result<CashRegister, AppError> {
    if !register::claim(conn).await? {
        return Err(AppError::RegisterMissing);
    }
    load_register(conn).await
}

async fn load_register(conn: &mut SqliteConnection) -> Result<CashRegister, AppError> {
    register::get(conn).await?.ok_or(AppError::RegisterMissing)
}

/// Decrement the register for an expense and log it. A zero charge writes nothing.
async fn charge(
    conn: &mut SqliteConnection,
    expense_id: ExpenseId,
    amount: Cents,
) -> Result<Cents, AppError> {
    if amount == 0 {
        return Ok(load_register(conn).await?.money);
    }
    let money = register::adjust_money(conn, -amount).await?;
    register::insert_history(conn, HistoryKind::Expense, amount, Some(expense_id), None, Utc::now())
        .await?;
    Ok(money)
}

async fn load_expense(conn: &mut SqliteConnection, expense_id: ExpenseId) -> Result<Expense, AppError> {
    register::get_expense(conn, expense_id)
        .await?
        .ok_or(AppError::ExpenseNotFound(expense_id))
}

/// An expense that exists and is not deleted.
async fn live_expense(conn: &mut SqliteConnection, expense_id: ExpenseId) -> Result<Expense, AppError> {
    let expense = register::get_expense(conn, expense_id)
        .await?
        .ok_or_else(|| rejected(AppError::ExpenseNotFound(expense_id)))?;
    if expense.deleted {
        return Err(rejected(AppError::ExpenseDeleted(expense_id)));
    }
    Ok(expense)
}

fn ensure_can_pay(current: &CashRegister, amount: Cents) -> Result<(), AppError> {
    if current.can_pay(amount) {
        Ok(())
    } else {
        Err(rejected(AppError::InsufficientRegisterBalance {
            balance: current.money,
            required: amount,
        }))
    }
}

fn validate_amount(amount: Cents) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(rejected(AppError::InvalidAmount(
            "Amount must be positive".to_string(),
        )));
    }
    Ok(())
}

fn validate_expense(input: &NewExpense) -> Result<(), AppError> {
    if input.title.trim().is_empty() {
        return Err(rejected(AppError::InvalidInput(
            "Expense title cannot be empty".to_string(),
        )));
    }
    if input.price < 0 {
        return Err(rejected(AppError::InvalidAmount(
            "Expense price cannot be negative".to_string(),
        )));
    }
    Ok(())
}
