//! File routing: which parsers run for a listing, and in what order.

pub mod registry;
pub mod router;

pub use registry::{Guard, MatchRule, RuleSet, Select};
pub use router::{FileRouter, Route, RoutePlan};
