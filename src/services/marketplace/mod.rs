/// Marketplace listings pipeline
///
/// [`proxy`] fetches listings through an ordered set of network routes and
/// [`discount`] decides how large a price drop must be to matter. The
/// polling loop and notifications that consume them live outside this crate.
pub mod discount;
pub mod proxy;

pub use discount::{evaluate_listing, required_percent, DiscountEvaluation, DynamicConstants};
pub use proxy::{order_candidates, Candidate, ListingFetcher};
