use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ErrorKind;
use crate::schema::{FundamentalsRecord, QuoteRecord};

const MILLION: f64 = 1_000_000.0;
const THOUSAND: f64 = 1_000.0;

/// Commands listed at the end of every error reply.
pub const AVAILABLE_COMMANDS: &str = "Available commands `@quote FB`, `@info TSLA`";

/// Renders a dollar amount, abbreviating millions and billions.
///
/// Only the final two-decimal formatting rounds; the scaling divisions are
/// applied to the raw value.
pub fn format_currency(amount: f64) -> String {
    if amount.abs() < MILLION {
        return format!("${}", two_decimals(amount));
    }

    let millions = amount / MILLION;
    if millions.abs() < THOUSAND {
        return format!("${}M", two_decimals(millions));
    }

    let billions = millions / THOUSAND;
    format!("${}B", two_decimals(billions))
}

/// Two fixed decimals, with exact ties rounded away from zero.
///
/// The decimal is built from the exact binary value, so `150.125` is a tie
/// while `1.005` (stored just below) is not.
fn two_decimals(value: f64) -> String {
    match Decimal::from_f64_retain(value) {
        Some(exact) => {
            let mut rounded = exact.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            rounded.rescale(2);
            rounded.to_string()
        }
        None => format!("{value:.2}"),
    }
}

pub fn format_quote_reply(record: &QuoteRecord) -> String {
    format!(
        "You will have to pay {} for 1 share of {}",
        format_currency(record.last_trade_price),
        record.symbol.to_uppercase()
    )
}

pub fn format_info_reply(record: &FundamentalsRecord) -> String {
    let pe_ratio = record
        .pe_ratio
        .map_or_else(|| String::from("n/a"), |ratio| ratio.to_string());

    [
        format!("Symbol: {}", record.symbol.to_uppercase()),
        format!("Open: {}", format_currency(record.open)),
        format!("Low: {}", format_currency(record.low)),
        format!("High: {}", format_currency(record.high)),
        format!("Low 52 Weeks: {}", format_currency(record.low_52_weeks)),
        format!("High 52 Weeks: {}", format_currency(record.high_52_weeks)),
        format!("P/E Ratio: {pe_ratio}%"),
        format!("Market Cap: {}", format_currency(record.market_cap)),
        format!("Description: {}", record.description.as_deref().unwrap_or_default()),
    ]
    .join("\n")
}

/// Text sent back for a failed command. Unsupported events get a bare
/// notice; every other kind lists the supported commands.
pub fn error_reply(kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::UnsupportedEvent => kind.to_string(),
        _ => format!("{kind}. \n{AVAILABLE_COMMANDS}"),
    }
}
