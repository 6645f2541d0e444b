//! NGN/GHS conversion between a user's own wallets.
//!
//! Pricing: `fee = round(amount * fee% / 100)`, `net = amount - fee`,
//! `converted = round(net * rate)`. The fee is retained by the platform.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        conversion::{ConversionQuote, ConversionRequest},
        rate::RateQuote,
        response::{PageParams, PaginationMeta},
        transaction::{
            NewTransaction, NewTransactionDetails, PaymentType, Recipient, TransactionStatus,
            TransactionType, TransactionWithDetails,
        },
        user::User,
        wallet::LedgerKind,
    },
    money::{Currency, calculate_fee, round_currency, validate_amount},
    services::{
        activity_service::{self, ClientMeta},
        rate_service, transaction_service, transaction_store,
        transaction_store::ListFilter,
        wallet_service,
    },
    state::AppState,
};

/// Price `amount` of `quote.from` in `quote.to`.
pub fn price(quote: RateQuote, amount: Decimal, fee_percent: Decimal) -> ConversionQuote {
    let original = round_currency(amount);
    let fee = calculate_fee(original, fee_percent);
    let net = original - fee;
    ConversionQuote {
        from: quote.from,
        to: quote.to,
        original,
        fee,
        fee_percent,
        net,
        converted: round_currency(net * quote.rate),
        rate: quote.rate,
        rate_source: quote.source,
        eta: "instant",
    }
}

fn parse_request(request: &ConversionRequest) -> Result<(Currency, Currency, Decimal), AppError> {
    let from: Currency = request.from.parse()?;
    let to: Currency = request.to.parse()?;
    if from == to {
        return Err(AppError::UnsupportedCurrencyPair(format!("{from}→{to}")));
    }
    Ok((from, to, validate_amount(request.amount)?))
}

/// Preview a conversion. Nothing is written.
pub async fn calculate(
    pool: &DbPool,
    fee_percent: Decimal,
    request: &ConversionRequest,
) -> Result<ConversionQuote, AppError> {
    let (from, to, amount) = parse_request(request)?;
    let rate = rate_service::current_rate(pool, from, to).await?;
    Ok(price(rate, amount, fee_percent))
}

/// Convert between the user's wallets.
///
/// Both wallet rows are locked, `from` first then `to`, and the debit, the
/// credit and the completed transaction commit together. The rate is read
/// inside the same database transaction, so the quote applied is the one in
/// force at commit.
pub async fn execute(
    state: &AppState,
    user: &User,
    request: &ConversionRequest,
    meta: &ClientMeta,
) -> Result<(TransactionWithDetails, ConversionQuote), AppError> {
    let (from, to, amount) = parse_request(request)?;

    let mut tx = state.pool.begin().await?;

    let rate = rate_service::current_rate(&mut *tx, from, to).await?;
    let quote = price(rate, amount, state.fee_percent());
    if quote.converted <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Amount is too small to convert".to_string(),
        ));
    }

    wallet_service::apply_delta(&mut tx, user.id, from, -quote.original, LedgerKind::Conversion)
        .await?;
    wallet_service::apply_delta(&mut tx, user.id, to, quote.converted, LedgerKind::Conversion)
        .await?;

    let created = transaction_store::create(
        &mut tx,
        &NewTransaction {
            user_id: user.id,
            transaction_type: TransactionType::Conversion,
            payment_type: PaymentType::Wallet,
            status: TransactionStatus::Pending,
            description: format!("Converted {from} to {to}"),
            wallet_debited: true,
            details: NewTransactionDetails {
                from_currency: from,
                to_currency: to,
                from_amount: quote.original,
                to_amount: quote.converted,
                fee: quote.fee,
                exchange_rate: Some(quote.rate),
                recipient: Recipient {
                    recipient_name: Some(user.full_name.clone()),
                    ..Default::default()
                },
                method_of_payment: PaymentType::Wallet.as_str().to_string(),
            },
        },
    )
    .await?;

    let transaction = transaction_store::update_status(
        &mut tx,
        &created.transaction,
        TransactionStatus::Completed,
        None,
    )
    .await?;

    tx.commit().await?;

    let completed = TransactionWithDetails {
        transaction,
        details: created.details,
    };

    tracing::info!(
        reference = %completed.transaction.reference,
        from = %from,
        to = %to,
        amount = %quote.original,
        converted = %quote.converted,
        rate = %quote.rate,
        "Conversion completed"
    );

    if let Some(details) = &completed.details {
        transaction_service::announce(state, &completed.transaction, details).await;
    }
    activity_service::log(
        &state.jobs,
        user.id,
        format!(
            "Converted {} {from} to {} {to}",
            quote.original, quote.converted
        ),
        meta,
    )
    .await;

    Ok((completed, quote))
}

/// The user's conversions, newest first.
pub async fn history(
    pool: &DbPool,
    user_id: Uuid,
    page: PageParams,
) -> Result<(Vec<TransactionWithDetails>, PaginationMeta), AppError> {
    let filter = ListFilter {
        user_id: Some(user_id),
        transaction_type: Some(TransactionType::Conversion),
        ..Default::default()
    };
    transaction_store::list(pool, &filter, page).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rate::RateSource;
    use rust_decimal_macros::dec;

    fn quote(from: Currency, to: Currency, rate: Decimal) -> RateQuote {
        RateQuote {
            from,
            to,
            rate,
            source: RateSource::Default,
        }
    }

    #[test]
    fn ngn_to_ghs_at_default_rate() {
        let q = price(
            quote(Currency::Ngn, Currency::Ghs, dec!(0.0053)),
            dec!(10000),
            dec!(2.0),
        );
        assert_eq!(q.original, dec!(10000.00));
        assert_eq!(q.fee, dec!(200.00));
        assert_eq!(q.net, dec!(9800.00));
        assert_eq!(q.converted, dec!(51.94));
        assert_eq!(q.eta, "instant");
        assert_eq!(q.rate_source, RateSource::Default);
    }

    #[test]
    fn ghs_to_ngn_rounds_half_away_from_zero() {
        let q = price(
            quote(Currency::Ghs, Currency::Ngn, dec!(188.68)),
            dec!(100),
            dec!(2.0),
        );
        assert_eq!(q.fee, dec!(2.00));
        assert_eq!(q.converted, dec!(18490.64));
    }

    #[test]
    fn zero_fee_converts_the_full_amount() {
        let q = price(
            quote(Currency::Ngn, Currency::Ghs, dec!(0.0053)),
            dec!(1000),
            Decimal::ZERO,
        );
        assert_eq!(q.fee, Decimal::ZERO);
        assert_eq!(q.converted, dec!(5.30));
    }

    #[test]
    fn same_currency_request_is_refused() {
        let request = ConversionRequest {
            from: "NGN".into(),
            to: "ngn".into(),
            amount: dec!(10),
        };
        assert!(matches!(
            parse_request(&request),
            Err(AppError::UnsupportedCurrencyPair(_))
        ));
    }

    #[test]
    fn non_positive_amount_is_refused() {
        let request = ConversionRequest {
            from: "NGN".into(),
            to: "GHS".into(),
            amount: dec!(0.004),
        };
        assert!(matches!(parse_request(&request), Err(AppError::Validation(_))));
    }
}
