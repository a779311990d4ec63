/// A macro to simplify the check-compute-store caching pattern.
///
/// Unless `$force` is true, the cache is consulted first and a hit is
/// returned as-is. Otherwise the provided future is awaited, its value stored
/// under `$key` and returned. Errors from the future are returned as-is and
/// nothing is cached.
///
/// # Arguments
/// * `$cache`: a [`TtlCache`](crate::cache::TtlCache) holding the result type.
/// * `$key`: the [`CacheKey`](crate::cache::CacheKey) for this request shape.
/// * `$force`: bypass the cache read (the fresh value is still stored).
/// * `$block`: the future computing the value on a miss.
///
/// # Example
/// ```rust,ignore
/// cached!(self.cache, CacheKey::Fitness(limit), force, self.fetch_summary(limit))
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $force:expr, $block:expr) => {{
        let key = $key;
        let hit = if $force { None } else { $cache.get(&key) };
        match hit {
            Some(cached) => {
                tracing::debug!(key = %key, "Cache hit");
                Ok(cached)
            }
            None => match $block.await {
                Ok(value) => {
                    $cache.set(&key, ::std::clone::Clone::clone(&value));
                    tracing::debug!(key = %key, "Cached fresh value");
                    Ok(value)
                }
                Err(e) => Err(e),
            },
        }
    }};
}
