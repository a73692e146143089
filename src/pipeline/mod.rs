//! One conversational turn, from recorded audio to the partner's reply.

pub mod exchange;
pub mod guard;
pub mod retry;

pub use exchange::{Exchange, ExchangeContext, RequestPipeline};
pub use guard::{BusyFlag, BusyGuard};
pub use retry::{RetryPolicy, RetryState};
