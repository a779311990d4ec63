pub mod keys;
pub mod ttl;

mod macros;

pub use keys::CacheKey;
pub use ttl::TtlCache;
