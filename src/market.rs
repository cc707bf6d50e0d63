use std::str::FromStr;

use rust_decimal::Decimal;

/// Token metadata as the wallet layer reports it. `decimals` is the display
/// scale, not the on-chain unit scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: String,
    pub decimals: u32,
}

impl Token {
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    pub base: Token,
    pub quote: Token,
}

impl Market {
    /// Prices on this market are denominated in the quote token.
    pub fn price_decimals(&self) -> u32 {
        self.quote.decimals
    }
}

/// Wallet balances, already formatted to display units by the balance
/// source. `None` means the balance is still loading; validation treats an
/// absent balance as "no violation".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    pub base: Option<Decimal>,
    pub quote: Option<Decimal>,
    pub native: Option<Decimal>,
}

impl Balances {
    pub fn from_formatted(
        base: Option<&str>,
        quote: Option<&str>,
        native: Option<&str>,
    ) -> Self {
        Self {
            base: base.and_then(parse_formatted),
            quote: quote.and_then(parse_formatted),
            native: native.and_then(parse_formatted),
        }
    }
}

fn parse_formatted(formatted: &str) -> Option<Decimal> {
    let trimmed = formatted.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Decimal::from_str(trimmed) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                target: "market",
                value = %formatted,
                error = %err,
                "unparseable formatted balance; treating as absent"
            );
            None
        }
    }
}
