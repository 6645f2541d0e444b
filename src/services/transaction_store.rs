//! Transaction store: CRUD over `transactions` and `transaction_details`.
//!
//! The engine in `transaction_service` decides *when* rows change; this
//! module only knows *how*. Status updates still go through
//! [`TransactionStatus::transition_to`] and a `status = 'pending'` guard so a
//! terminal row can never be rewritten.

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        response::{PageParams, PaginationMeta},
        transaction::{
            CurrencyVolume, NewTransaction, Transaction, TransactionDetails, TransactionFilter,
            TransactionStats, TransactionStatus, TransactionType, TransactionWithDetails,
            derive_direction,
        },
    },
    money::Currency,
};

/// Public reference: `<PREFIX>_<unix seconds>_<6 random chars>`.
pub fn generate_reference(kind: TransactionType) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!(
        "{}_{}_{suffix}",
        kind.reference_prefix(),
        Utc::now().timestamp()
    )
}

/// Append `"<label>: <reason>"` to a description.
pub fn append_reason(description: &str, label: &str, reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        return description.to_string();
    }
    if description.trim().is_empty() {
        format!("{label}: {reason}")
    } else {
        format!("{description} | {label}: {reason}")
    }
}

/// Insert a transaction and its details row.
pub async fn create(
    conn: &mut PgConnection,
    new: &NewTransaction,
) -> Result<TransactionWithDetails, AppError> {
    let details = &new.details;
    let direction = derive_direction(
        new.transaction_type,
        details.from_currency,
        details.to_currency,
    );

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            reference, user_id, transaction_type, direction, payment_type,
            status, description, wallet_debited
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(generate_reference(new.transaction_type))
    .bind(new.user_id)
    .bind(new.transaction_type)
    .bind(direction)
    .bind(new.payment_type)
    .bind(new.status)
    .bind(&new.description)
    .bind(new.wallet_debited)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match AppError::from(e) {
        err if err.is_unique_violation() => {
            AppError::Conflict("Transaction reference already exists".to_string())
        }
        err => err,
    })?;

    let recipient = &details.recipient;
    let details = sqlx::query_as::<_, TransactionDetails>(
        r#"
        INSERT INTO transaction_details (
            transaction_id, from_currency, to_currency, from_amount, to_amount,
            fee, exchange_rate, recipient_name, bank_name, account_number,
            phone_number, network, method_of_payment
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(transaction.id)
    .bind(details.from_currency)
    .bind(details.to_currency)
    .bind(details.from_amount)
    .bind(details.to_amount)
    .bind(details.fee)
    .bind(details.exchange_rate)
    .bind(&recipient.recipient_name)
    .bind(&recipient.bank_name)
    .bind(&recipient.account_number)
    .bind(&recipient.phone_number)
    .bind(&recipient.network)
    .bind(&details.method_of_payment)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        reference = %transaction.reference,
        kind = transaction.transaction_type.as_str(),
        status = %transaction.status,
        "Transaction created"
    );

    Ok(TransactionWithDetails {
        transaction,
        details: Some(details),
    })
}

pub async fn find_by_reference<'e, E: PgExecutor<'e>>(
    executor: E,
    reference: &str,
) -> Result<Option<Transaction>, AppError> {
    let tx = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(executor)
        .await?;
    Ok(tx)
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<Transaction>, AppError> {
    let tx = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(tx)
}

/// Lock a transaction row for the rest of the database transaction.
pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Transaction, AppError> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::TransactionNotFound)
}

pub async fn lock_by_reference(
    conn: &mut PgConnection,
    reference: &str,
) -> Result<Option<Transaction>, AppError> {
    let tx = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE reference = $1 FOR UPDATE",
    )
    .bind(reference)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(tx)
}

pub async fn details_for<'e, E: PgExecutor<'e>>(
    executor: E,
    transaction_id: Uuid,
) -> Result<TransactionDetails, AppError> {
    sqlx::query_as::<_, TransactionDetails>(
        "SELECT * FROM transaction_details WHERE transaction_id = $1",
    )
    .bind(transaction_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::Internal(format!("transaction {transaction_id} has no details")))
}

/// Transaction with details, scoped to its owner.
pub async fn find_for_user(
    pool: &DbPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<TransactionWithDetails, AppError> {
    let transaction = find_by_id(pool, id)
        .await?
        .filter(|tx| tx.user_id == user_id)
        .ok_or(AppError::TransactionNotFound)?;
    let details = details_for(pool, transaction.id).await?;
    Ok(TransactionWithDetails {
        transaction,
        details: Some(details),
    })
}

/// Move a pending transaction to a terminal state.
///
/// `description` replaces the stored description when given. Fails with
/// `InvalidTransition` if the row is no longer pending.
pub async fn update_status(
    conn: &mut PgConnection,
    transaction: &Transaction,
    next: TransactionStatus,
    description: Option<String>,
) -> Result<Transaction, AppError> {
    transaction.status.transition_to(next)?;

    let updated = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = $2,
            description = COALESCE($3, description),
            updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(transaction.id)
    .bind(next)
    .bind(description)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        AppError::InvalidTransition(format!("{} is no longer pending", transaction.reference))
    })?;

    tracing::info!(
        reference = %updated.reference,
        from = %transaction.status,
        to = %updated.status,
        "Transaction status changed"
    );

    Ok(updated)
}

/// A [`TransactionFilter`] with its strings parsed.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    pub transaction_type: Option<TransactionType>,
    pub currency: Option<Currency>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl TryFrom<&TransactionFilter> for ListFilter {
    type Error = AppError;

    fn try_from(filter: &TransactionFilter) -> Result<Self, Self::Error> {
        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                return Err(AppError::Validation(
                    "date_from must not be after date_to".to_string(),
                ));
            }
        }
        Ok(Self {
            user_id: filter.user_id,
            status: non_empty(&filter.status).map(str::parse).transpose()?,
            transaction_type: non_empty(&filter.transaction_type)
                .map(str::parse)
                .transpose()?,
            currency: non_empty(&filter.currency).map(str::parse).transpose()?,
            date_from: filter.date_from,
            date_to: filter.date_to,
            search: non_empty(&filter.search).map(str::to_string),
        })
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a ListFilter) {
    if let Some(user_id) = filter.user_id {
        qb.push(" AND t.user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND t.status = ").push_bind(status);
    }
    if let Some(kind) = filter.transaction_type {
        qb.push(" AND t.transaction_type = ").push_bind(kind);
    }
    if let Some(currency) = filter.currency {
        qb.push(" AND (d.from_currency = ")
            .push_bind(currency)
            .push(" OR d.to_currency = ")
            .push_bind(currency)
            .push(")");
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND t.created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND t.created_at <= ").push_bind(to);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (t.reference ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Filtered, paginated listing, newest first.
pub async fn list(
    pool: &DbPool,
    filter: &ListFilter,
    page: PageParams,
) -> Result<(Vec<TransactionWithDetails>, PaginationMeta), AppError> {
    let page = page.clamp();

    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM transactions t \
         JOIN transaction_details d ON d.transaction_id = t.id WHERE TRUE",
    );
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new(
        "SELECT t.* FROM transactions t \
         JOIN transaction_details d ON d.transaction_id = t.id WHERE TRUE",
    );
    push_filters(&mut select, filter);
    select
        .push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let transactions: Vec<Transaction> = select.build_query_as().fetch_all(pool).await?;

    let ids: Vec<Uuid> = transactions.iter().map(|t| t.id).collect();
    let mut details = sqlx::query_as::<_, TransactionDetails>(
        "SELECT * FROM transaction_details WHERE transaction_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let rows = transactions
        .into_iter()
        .map(|transaction| {
            let position = details
                .iter()
                .position(|d| d.transaction_id == transaction.id);
            TransactionWithDetails {
                details: position.map(|i| details.swap_remove(i)),
                transaction,
            }
        })
        .collect();

    Ok((rows, page.meta(total)))
}

/// Per-status counts and completed volume. `None` aggregates every user.
pub async fn stats(pool: &DbPool, user_id: Option<Uuid>) -> Result<TransactionStats, AppError> {
    let (total, pending, completed, failed): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE status = 'pending'),
            COUNT(*) FILTER (WHERE status = 'completed'),
            COUNT(*) FILTER (WHERE status = 'failed')
        FROM transactions
        WHERE ($1::uuid IS NULL OR user_id = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let volume = sqlx::query_as::<_, CurrencyVolume>(
        r#"
        SELECT d.from_currency AS currency, COALESCE(SUM(d.from_amount), 0) AS completed_amount
        FROM transactions t
        JOIN transaction_details d ON d.transaction_id = t.id
        WHERE t.status = 'completed' AND ($1::uuid IS NULL OR t.user_id = $1)
        GROUP BY d.from_currency
        ORDER BY d.from_currency
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(TransactionStats {
        total,
        pending,
        completed,
        failed,
        volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_carries_type_prefix() {
        let reference = generate_reference(TransactionType::Deposit);
        let parts: Vec<&str> = reference.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TOPUP");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| !c.is_ascii_uppercase()));
        assert_ne!(reference, generate_reference(TransactionType::Deposit));
    }

    #[test]
    fn reasons_are_appended() {
        assert_eq!(
            append_reason("Withdrawal to GTBank", "Rejected", "invalid account"),
            "Withdrawal to GTBank | Rejected: invalid account"
        );
        assert_eq!(append_reason("", "Failed", "declined"), "Failed: declined");
        assert_eq!(append_reason("Top-up", "Failed", "  "), "Top-up");
    }

    #[test]
    fn filter_strings_are_parsed() {
        let filter = TransactionFilter {
            status: Some("completed".into()),
            transaction_type: Some("withdrawal".into()),
            currency: Some("ghs".into()),
            search: Some("  ".into()),
            ..Default::default()
        };
        let parsed = ListFilter::try_from(&filter).unwrap();
        assert_eq!(parsed.status, Some(TransactionStatus::Completed));
        assert_eq!(parsed.transaction_type, Some(TransactionType::Withdrawal));
        assert_eq!(parsed.currency, Some(Currency::Ghs));
        assert_eq!(parsed.search, None);

        let bad = TransactionFilter {
            currency: Some("USD".into()),
            ..Default::default()
        };
        assert!(ListFilter::try_from(&bad).is_err());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
