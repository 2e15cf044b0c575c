//! Splitting a sell across auxiliary instruments
//!
//! A sell names `(instrument, share_bps)` allocations summing to 10 000.
//! Each instrument receives `amount × share / 10_000` staking-asset units,
//! converted to instrument units at its price (floored). Proceeds below the
//! instrument's minimum purchase are rejected rather than rounded away.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tierstake_core::constants::BPS_DENOMINATOR;
use tierstake_core::{Amount, InstrumentId, LedgerError, Result};

use crate::config::InstrumentConfig;
use crate::events::SaleProceeds;

/// Share of a sell routed to one instrument
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub instrument: InstrumentId,
    pub share_bps: u32,
}

impl Allocation {
    pub fn new(instrument: impl Into<InstrumentId>, share_bps: u32) -> Self {
        Self {
            instrument: instrument.into(),
            share_bps,
        }
    }
}

/// Where per-instrument prices come from
#[derive(Clone, Copy, Debug)]
pub enum PriceSource<'a> {
    /// Configured instrument prices
    Configured,
    /// Signed prices, positionally matching the allocations
    Signed(&'a [Amount]),
}

/// Compute per-instrument units for selling `amount`
pub fn plan_sale(
    amount: Amount,
    allocations: &[Allocation],
    instruments: &BTreeMap<InstrumentId, InstrumentConfig>,
    prices: PriceSource<'_>,
) -> Result<Vec<SaleProceeds>> {
    if allocations.is_empty() {
        return Err(LedgerError::invalid_amount(amount, "no instrument allocations"));
    }
    if let PriceSource::Signed(signed) = prices {
        if signed.len() != allocations.len() {
            return Err(LedgerError::invalid_amount(
                amount,
                format!("{} signed prices for {} allocations", signed.len(), allocations.len()),
            ));
        }
    }
    let total_share: u128 = allocations.iter().map(|a| a.share_bps as u128).sum();
    if total_share != BPS_DENOMINATOR {
        return Err(LedgerError::invalid_amount(
            amount,
            format!("allocation shares sum to {} bps, expected {}", total_share, BPS_DENOMINATOR),
        ));
    }

    let mut proceeds = Vec::with_capacity(allocations.len());
    for (index, allocation) in allocations.iter().enumerate() {
        let instrument = instruments
            .get(&allocation.instrument)
            .ok_or_else(|| LedgerError::InvalidInstrument(allocation.instrument.clone()))?;
        let price = match prices {
            PriceSource::Configured => instrument.price,
            PriceSource::Signed(signed) => signed[index],
        };
        if price == 0 {
            return Err(LedgerError::InvalidInstrument(allocation.instrument.clone()));
        }

        let value = amount.saturating_mul(allocation.share_bps as Amount) / BPS_DENOMINATOR;
        let units = value / price;
        if units == 0 || units < instrument.min_purchase {
            return Err(LedgerError::invalid_amount(
                amount,
                format!(
                    "{} units of {} below minimum purchase {}",
                    units, allocation.instrument, instrument.min_purchase
                ),
            ));
        }
        proceeds.push(SaleProceeds {
            instrument: allocation.instrument.clone(),
            units,
        });
    }
    Ok(proceeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruments() -> BTreeMap<InstrumentId, InstrumentConfig> {
        let mut map = BTreeMap::new();
        map.insert("gold".to_string(), InstrumentConfig { price: 100, min_purchase: 5 });
        map.insert("silver".to_string(), InstrumentConfig { price: 10, min_purchase: 1 });
        map
    }

    #[test]
    fn test_split_by_share() {
        let plan = plan_sale(
            10_000,
            &[Allocation::new("gold", 7_500), Allocation::new("silver", 2_500)],
            &instruments(),
            PriceSource::Configured,
        )
        .unwrap();
        assert_eq!(plan[0], SaleProceeds { instrument: "gold".into(), units: 75 });
        assert_eq!(plan[1], SaleProceeds { instrument: "silver".into(), units: 250 });
    }

    #[test]
    fn test_signed_prices_replace_configured() {
        let plan = plan_sale(
            10_000,
            &[Allocation::new("gold", 10_000)],
            &instruments(),
            PriceSource::Signed(&[50]),
        )
        .unwrap();
        assert_eq!(plan[0].units, 200);
    }

    #[test]
    fn test_rejections() {
        let instruments = instruments();
        let gold = [Allocation::new("gold", 10_000)];

        let short = [Allocation::new("gold", 9_999)];
        assert!(matches!(
            plan_sale(10_000, &short, &instruments, PriceSource::Configured),
            Err(LedgerError::InvalidAmount { .. })
        ));
        let copper = [Allocation::new("copper", 10_000)];
        assert!(matches!(
            plan_sale(10_000, &copper, &instruments, PriceSource::Configured),
            Err(LedgerError::InvalidInstrument(_))
        ));
        // 499 / 100 = 4 units, below the minimum of 5
        assert!(matches!(
            plan_sale(499, &gold, &instruments, PriceSource::Configured),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            plan_sale(10_000, &gold, &instruments, PriceSource::Signed(&[0])),
            Err(LedgerError::InvalidInstrument(_))
        ));
        assert!(matches!(
            plan_sale(10_000, &gold, &instruments, PriceSource::Signed(&[1, 2])),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(plan_sale(10_000, &[], &instruments, PriceSource::Configured).is_err());
    }
}
