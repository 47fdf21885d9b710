//! Static account read from the `[account]` config section.
//!
//! ```ini
//! [account]
//! equity = 1000000
//! positions = BTC_KRW:0.25, ETH_KRW:3
//! ```

use std::collections::HashMap;

use crate::domain::error::TradecoreError;
use crate::ports::account_port::AccountPort;
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "account";

#[derive(Debug, Clone, PartialEq)]
pub struct FixedAccount {
    equity: f64,
    positions: HashMap<String, f64>,
}

impl FixedAccount {
    pub fn new(equity: f64) -> Self {
        Self {
            equity,
            positions: HashMap::new(),
        }
    }

    pub fn with_position(mut self, symbol: &str, quantity: f64) -> Self {
        self.positions.insert(symbol.to_uppercase(), quantity);
        self
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradecoreError> {
        let raw = config
            .get_string(SECTION, "equity")
            .ok_or_else(|| TradecoreError::ConfigMissing {
                section: SECTION.into(),
                key: "equity".into(),
            })?;
        let equity: f64 = raw.trim().parse().map_err(|_| TradecoreError::ConfigInvalid {
            section: SECTION.into(),
            key: "equity".into(),
            reason: format!("not a number: {raw}"),
        })?;

        let mut account = FixedAccount::new(equity);
        for entry in config.get_list(SECTION, "positions").unwrap_or_default() {
            let (symbol, quantity) = parse_position(&entry)?;
            account = account.with_position(symbol, quantity);
        }
        Ok(account)
    }
}

fn parse_position(entry: &str) -> Result<(&str, f64), TradecoreError> {
    let invalid = |reason: String| TradecoreError::ConfigInvalid {
        section: SECTION.into(),
        key: "positions".into(),
        reason,
    };
    let (symbol, quantity) = entry
        .split_once(':')
        .ok_or_else(|| invalid(format!("expected SYMBOL:QUANTITY, got {entry}")))?;
    let quantity: f64 = quantity
        .trim()
        .parse()
        .map_err(|_| invalid(format!("invalid quantity in {entry}")))?;
    if quantity < 0.0 {
        return Err(invalid(format!("negative quantity in {entry}")));
    }
    Ok((symbol.trim(), quantity))
}

impl AccountPort for FixedAccount {
    fn equity(&self) -> Result<f64, TradecoreError> {
        Ok(self.equity)
    }

    fn position(&self, symbol: &str) -> Result<f64, TradecoreError> {
        Ok(self.positions.get(symbol).copied().unwrap_or(0.0))
    }
}
