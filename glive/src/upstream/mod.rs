//! Upstream adapters.

mod exchange;

pub use exchange::ExchangeUpstream;
