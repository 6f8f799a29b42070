use crate::client::RawInstrument;

pub const PERPETUAL_SWAP: &str = "SWAP";

/// Eligibility rule for scanned instruments. Both conditions must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentFilter {
    pub inst_type: String,
    pub quote_suffix: String,
}

impl InstrumentFilter {
    /// Perpetual swaps quoted in `quote_currency`, e.g. `USDT` -> ids ending in `-USDT`.
    pub fn perpetuals_quoted_in(quote_currency: &str) -> Self {
        Self {
            inst_type: PERPETUAL_SWAP.to_string(),
            quote_suffix: format!("-{}", quote_currency.trim().to_uppercase()),
        }
    }

    pub fn quote_currency(&self) -> &str {
        self.quote_suffix.trim_start_matches('-')
    }
}

pub fn matches_filters(instrument: &RawInstrument, filter: &InstrumentFilter) -> bool {
    instrument.inst_type == filter.inst_type && instrument.inst_id.ends_with(&filter.quote_suffix)
}
