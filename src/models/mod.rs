pub mod quantity;
pub mod quote;
pub mod token;
pub mod transaction;

pub use quantity::{to_human, to_raw, Quantity, QuantitySpec};
pub use quote::{AggregatorTrade, BackendKind, BackendOptions, Quote, SwapIntent, DEFAULT_FEE_TIER, DEFAULT_SLIPPAGE_BPS};
pub use token::{parse_address, TokenInfo, TokenRef};
pub use transaction::{ReceiptOutcome, TransactionRequest, TxReceipt};

/// Decimal precision of every chain's native asset.
pub const NATIVE_DECIMALS: u8 = 18;
