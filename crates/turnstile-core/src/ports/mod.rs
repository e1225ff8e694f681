//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod clock;
mod counter_store;

pub use auth::{AuthError, TokenClaims, TokenService};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter_store::{CounterStore, StoreError, WindowRecord};
