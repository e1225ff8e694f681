//! Domain types - identifiers, tiers, policies, verdicts and the route table.

mod identifier;
mod policy;
mod route;
mod verdict;

pub use identifier::{Identifier, UNKNOWN_ADDRESS};
pub use policy::{Policy, PolicyRegistry, PolicyRegistryBuilder, Tier, UnknownTierMode};
pub use route::{RouteRule, RouteTiers};
pub use verdict::Verdict;

pub(crate) use verdict::instant_after;
