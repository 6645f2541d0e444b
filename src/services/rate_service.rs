//! Exchange rate lookup and administration.

use rust_decimal::Decimal;
use sqlx::PgExecutor;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        admin_log::AdminActor,
        rate::{ExchangeRate, RateHistoryQuery, RateQuote, RateSource, SetRateRequest},
        response::{PageParams, PaginationMeta},
    },
    money::Currency,
    services::admin_service,
};

/// Built-in NGN→GHS rate used when no rate is configured.
pub const DEFAULT_NGN_GHS: Decimal = Decimal::from_parts(53, 0, 0, false, 4);
/// Built-in GHS→NGN rate used when no rate is configured.
pub const DEFAULT_GHS_NGN: Decimal = Decimal::from_parts(18868, 0, 0, false, 2);

fn check_pair(from: Currency, to: Currency) -> Result<(), AppError> {
    if from == to {
        return Err(AppError::UnsupportedCurrencyPair(format!("{from}→{to}")));
    }
    Ok(())
}

/// Fallback rate for a supported directed pair.
pub fn default_rate(from: Currency, to: Currency) -> Result<Decimal, AppError> {
    match (from, to) {
        (Currency::Ngn, Currency::Ghs) => Ok(DEFAULT_NGN_GHS),
        (Currency::Ghs, Currency::Ngn) => Ok(DEFAULT_GHS_NGN),
        _ => Err(AppError::UnsupportedCurrencyPair(format!("{from}→{to}"))),
    }
}

/// The active, in-window rate for a directed pair, or the built-in default
/// tagged `source = default`.
pub async fn current_rate<'e, E: PgExecutor<'e>>(
    executor: E,
    from: Currency,
    to: Currency,
) -> Result<RateQuote, AppError> {
    check_pair(from, to)?;

    let row = sqlx::query_as::<_, ExchangeRate>(
        r#"
        SELECT * FROM exchange_rates
        WHERE from_currency = $1 AND to_currency = $2 AND is_active
          AND valid_from <= NOW()
          AND (valid_to IS NULL OR valid_to > NOW())
        ORDER BY valid_from DESC
        LIMIT 1
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(rate) => Ok(RateQuote {
            from,
            to,
            rate: rate.rate,
            source: rate.source,
        }),
        None => Ok(RateQuote {
            from,
            to,
            rate: default_rate(from, to)?,
            source: RateSource::Default,
        }),
    }
}

/// Current rate for every supported directed pair.
pub async fn all_rates(pool: &DbPool) -> Result<Vec<RateQuote>, AppError> {
    let mut quotes = Vec::new();
    for from in Currency::ALL {
        quotes.push(current_rate(pool, from, from.counterpart()).await?);
    }
    Ok(quotes)
}

/// Replace the active rate of a pair.
///
/// The previous row is closed (`is_active = false`, `valid_to = now`) and a
/// new one inserted in the same database transaction, so readers never see
/// two active rows or none.
pub async fn set_rate(
    pool: &DbPool,
    actor: &AdminActor,
    request: &SetRateRequest,
) -> Result<ExchangeRate, AppError> {
    let from: Currency = request.from_currency.parse()?;
    let to: Currency = request.to_currency.parse()?;
    check_pair(from, to)?;
    if request.rate <= Decimal::ZERO {
        return Err(AppError::Validation("Rate must be greater than zero".to_string()));
    }
    let source = match request.source {
        None | Some(RateSource::Manual) => RateSource::Manual,
        Some(RateSource::Feed) => RateSource::Feed,
        Some(RateSource::Default) => {
            return Err(AppError::Validation(
                "Rate source must be manual or feed".to_string(),
            ));
        }
    };

    let mut tx = pool.begin().await?;

    let previous: Option<Decimal> = sqlx::query_scalar(
        r#"
        UPDATE exchange_rates
        SET is_active = false, valid_to = NOW()
        WHERE from_currency = $1 AND to_currency = $2 AND is_active
        RETURNING rate
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_optional(&mut *tx)
    .await?;

    let rate = sqlx::query_as::<_, ExchangeRate>(
        r#"
        INSERT INTO exchange_rates (from_currency, to_currency, rate, source, set_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(from)
    .bind(to)
    .bind(request.rate)
    .bind(source)
    .bind(actor.admin_id)
    .fetch_one(&mut *tx)
    .await?;

    admin_service::record_action(
        &mut tx,
        actor,
        "set_rate",
        "exchange_rate",
        &rate.id.to_string(),
        serde_json::json!({
            "pair": format!("{from}→{to}"),
            "rate": rate.rate,
            "previous": previous,
            "source": source,
        }),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(pair = %format!("{from}→{to}"), rate = %rate.rate, "Exchange rate set");
    Ok(rate)
}

/// Rate rows, newest first, optionally for one directed pair.
pub async fn history(
    pool: &DbPool,
    query: &RateHistoryQuery,
) -> Result<(Vec<ExchangeRate>, PaginationMeta), AppError> {
    let from: Option<Currency> = query.from_currency.as_deref().map(str::parse).transpose()?;
    let to: Option<Currency> = query.to_currency.as_deref().map(str::parse).transpose()?;
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .clamp();

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM exchange_rates
        WHERE ($1::currency_code IS NULL OR from_currency = $1)
          AND ($2::currency_code IS NULL OR to_currency = $2)
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, ExchangeRate>(
        r#"
        SELECT * FROM exchange_rates
        WHERE ($1::currency_code IS NULL OR from_currency = $1)
          AND ($2::currency_code IS NULL OR to_currency = $2)
        ORDER BY valid_from DESC, created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(from)
    .bind(to)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, page.meta(total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_cover_both_directions() {
        assert_eq!(default_rate(Currency::Ngn, Currency::Ghs).unwrap(), dec!(0.0053));
        assert_eq!(default_rate(Currency::Ghs, Currency::Ngn).unwrap(), dec!(188.68));
    }

    #[test]
    fn same_currency_is_not_a_pair() {
        assert!(matches!(
            default_rate(Currency::Ngn, Currency::Ngn),
            Err(AppError::UnsupportedCurrencyPair(_))
        ));
        assert!(check_pair(Currency::Ghs, Currency::Ghs).is_err());
    }
}
