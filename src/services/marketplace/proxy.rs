use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Url;
use serde_json::Value;

use crate::{
    models::marketplace::{FetchResult, Listing, ListingQuery, ProxyConfig},
    services::http::{HttpRequest, HttpTransport, TransportError},
};

pub const MARKETPLACE_ORIGIN: &str = "https://csfloat.com";
const LISTINGS_PATH: &str = "/api/v1/listings";

/// Chance of trying the non-local proxies before the local ones
pub const OTHER_FIRST_PROBABILITY: f64 = 0.15;

/// One route a listings request can take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Direct,
    Proxy(ProxyConfig),
}

impl Candidate {
    pub fn label(&self) -> &str {
        match self {
            Candidate::Direct => "Direct",
            Candidate::Proxy(proxy) => &proxy.url,
        }
    }
}

/// Orders the configured proxies for one fetch
///
/// Local direct proxies and all others are shuffled separately. The others
/// go first with probability [`OTHER_FIRST_PROBABILITY`] (when there are
/// any), the local ones otherwise. No proxies means a single direct attempt.
pub fn order_candidates<R: Rng + ?Sized>(proxies: &[ProxyConfig], rng: &mut R) -> Vec<Candidate> {
    if proxies.is_empty() {
        return vec![Candidate::Direct];
    }

    let (mut local, mut other): (Vec<ProxyConfig>, Vec<ProxyConfig>) =
        proxies.iter().cloned().partition(ProxyConfig::is_local);

    local.shuffle(rng);
    other.shuffle(rng);

    let roll: f64 = rng.gen();
    let (first, second) = if roll < OTHER_FIRST_PROBABILITY && !other.is_empty() {
        (other, local)
    } else {
        (local, other)
    };

    first
        .into_iter()
        .chain(second)
        .map(Candidate::Proxy)
        .collect()
}

/// URL actually requested for `target` through `candidate`
///
/// A direct proxy replaces the marketplace origin; any other proxy gets the
/// whole target URL appended verbatim.
pub fn effective_url(candidate: &Candidate, target: &str, origin: &str) -> String {
    match candidate {
        Candidate::Direct => target.to_string(),
        Candidate::Proxy(proxy) if proxy.is_direct => {
            let path = target.strip_prefix(origin).unwrap_or(target);
            format!("{}{}", proxy.url.trim_end_matches('/'), path)
        }
        Candidate::Proxy(proxy) => format!("{}{}", proxy.url, target),
    }
}

/// Fetches marketplace listings, failing over across proxies
///
/// Candidates are tried strictly one after another. A 429 ends the whole
/// fetch since the remaining routes most likely share the same upstream
/// rate-limit bucket. The fetcher never returns an error: the outcome is
/// always described by the [`FetchResult`].
pub struct ListingFetcher {
    transport: Arc<dyn HttpTransport>,
    origin: String,
}

impl ListingFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_origin(transport, MARKETPLACE_ORIGIN)
    }

    pub fn with_origin(transport: Arc<dyn HttpTransport>, origin: &str) -> Self {
        Self {
            transport,
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    /// Builds the listings URL, leaving out filters at their "unset" values
    pub fn target_url(&self, query: &ListingQuery) -> Result<String, String> {
        let mut params: Vec<(&str, String)> = vec![
            ("sort_by", query.sort_by.as_str().to_string()),
            ("limit", query.limit.to_string()),
            ("min_price", query.min_price.to_string()),
            ("max_price", query.max_price.to_string()),
            ("category", query.category.to_string()),
            ("_", Utc::now().timestamp_millis().to_string()),
        ];

        if query.listing_type != "any" {
            params.push(("type", query.listing_type.clone()));
        }

        for (name, value) in [
            ("rarity", query.rarity),
            ("def_index", query.def_index),
            ("paint_index", query.paint_index),
            ("paint_seed", query.paint_seed),
        ] {
            if value != -1 {
                params.push((name, value.to_string()));
            }
        }

        if query.min_float > 0.0 {
            params.push(("min_float", query.min_float.to_string()));
        }
        if query.max_float < 1.0 {
            params.push(("max_float", query.max_float.to_string()));
        }
        if query.min_blue > 0.0 {
            params.push(("min_blue", query.min_blue.to_string()));
        }
        if query.max_blue < 100.0 {
            params.push(("max_blue", query.max_blue.to_string()));
        }
        if query.min_fade > 80.0 {
            params.push(("min_fade", query.min_fade.to_string()));
        }
        if query.max_fade < 100.0 {
            params.push(("max_fade", query.max_fade.to_string()));
        }
        if query.min_ref_qty > 0 {
            params.push(("min_ref_qty", query.min_ref_qty.to_string()));
        }
        if let Some(user_id) = query.user_id.as_deref().filter(|s| !s.is_empty()) {
            params.push(("user_id", user_id.to_string()));
        }
        if let Some(name) = query.market_hash_name.as_deref().filter(|s| !s.is_empty()) {
            params.push(("market_hash_name", name.to_string()));
        }

        Url::parse_with_params(&format!("{}{}", self.origin, LISTINGS_PATH), &params)
            .map(String::from)
            .map_err(|e| format!("Invalid listings URL: {}", e))
    }

    /// Fetches listings using a freshly randomized candidate order
    pub async fn fetch(&self, query: &ListingQuery) -> FetchResult {
        let candidates = order_candidates(&query.proxies, &mut rand::thread_rng());
        self.fetch_from(query, candidates).await
    }

    /// Fetches listings trying `candidates` in the given order
    pub async fn fetch_from(&self, query: &ListingQuery, candidates: Vec<Candidate>) -> FetchResult {
        let target = match self.target_url(query) {
            Ok(url) => url,
            Err(error) => return failure(error),
        };

        let mut last_error = String::new();

        for candidate in &candidates {
            let label = candidate.label();
            let mut request = HttpRequest::get(effective_url(candidate, &target, &self.origin))
                .header("Accept", "application/json");
            if !query.api_key.is_empty() {
                request = request.header("Authorization", query.api_key.clone());
            }

            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(TransportError::Network(_)) => {
                    last_error = format!("Proxy {} failed: CORS/Network block", label);
                    tracing::warn!(proxy = %label, "Listings request blocked");
                    continue;
                }
                Err(e) => {
                    last_error = format!("Proxy {} failed: {}", label, e);
                    tracing::warn!(proxy = %label, error = %e, "Listings request failed");
                    continue;
                }
            };

            if response.status == 401 || response.status == 403 {
                last_error = format!(
                    "Proxy {} auth failed: {}. Check the API key or whether the proxy forwards the Authorization header.",
                    label, response.status
                );
                tracing::warn!(proxy = %label, status = response.status, "Listings auth rejected");
                continue;
            }

            if response.status == 429 {
                let reset_time = response
                    .header("X-RateLimit-Reset")
                    .and_then(|v| v.trim().parse::<u64>().ok());
                tracing::warn!(proxy = %label, reset_time = ?reset_time, "Listings rate limited");
                return FetchResult {
                    listings: Vec::new(),
                    status: 429,
                    reset_time,
                    proxy_used: Some(label.to_string()),
                    error: None,
                };
            }

            if !response.is_success() {
                last_error = format!("Proxy {} error: {}", label, response.status);
                tracing::warn!(proxy = %label, status = response.status, "Listings request failed");
                continue;
            }

            let body: Value = match serde_json::from_str(&response.body) {
                Ok(body) => body,
                Err(e) => {
                    last_error = format!("Proxy {} failed: {}", label, e);
                    continue;
                }
            };

            let listings = parse_listings(&body);
            tracing::info!(proxy = %label, listings = listings.len(), "Listings fetched");

            return FetchResult {
                listings,
                status: 200,
                reset_time: None,
                proxy_used: Some(label.to_string()),
                error: None,
            };
        }

        tracing::error!(attempts = candidates.len(), error = %last_error, "All listing routes failed");
        failure(last_error)
    }
}

fn failure(error: String) -> FetchResult {
    FetchResult {
        listings: Vec::new(),
        status: 500,
        reset_time: None,
        proxy_used: None,
        error: Some(error),
    }
}

/// Reads listings from `data` or `listings`, skipping entries that don't parse
fn parse_listings(body: &Value) -> Vec<Listing> {
    let Some(items) = body
        .get("data")
        .or_else(|| body.get("listings"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let listings: Vec<Listing> = items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect();

    if listings.len() < items.len() {
        tracing::debug!(
            skipped = items.len() - listings.len(),
            "Skipped unparseable listings"
        );
    }

    listings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::http::{HttpResponse, MockHttpTransport};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const LISTING: &str = r#"{
        "id": "1",
        "created_at": "2024-05-01T10:00:00Z",
        "price": 1500,
        "type": "buy_now",
        "item": {"market_hash_name": "P250 | Sand Dune (Factory New)"}
    }"#;

    fn proxies() -> Vec<ProxyConfig> {
        vec![
            ProxyConfig::direct("http://localhost:8010/proxy"),
            ProxyConfig::forwarding("https://corsproxy.io/?"),
            ProxyConfig::direct("http://127.0.0.1:9000/"),
            ProxyConfig::direct("https://relay.example.com"),
        ]
    }

    fn is_local(candidate: &Candidate) -> bool {
        matches!(candidate, Candidate::Proxy(p) if p.is_local())
    }

    #[test]
    fn test_no_proxies_means_single_direct_attempt() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(order_candidates(&[], &mut rng), vec![Candidate::Direct]);
    }

    #[test]
    fn test_ordering_keeps_partitions_contiguous() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let ordered = order_candidates(&proxies(), &mut rng);
            assert_eq!(ordered.len(), 4);

            let flags: Vec<bool> = ordered.iter().map(is_local).collect();
            let switches = flags.windows(2).filter(|w| w[0] != w[1]).count();
            assert_eq!(switches, 1, "partitions interleaved: {:?}", ordered);
        }
    }

    #[test]
    fn test_other_partition_first_about_fifteen_percent() {
        let mut rng = StdRng::seed_from_u64(1234);
        let trials = 20_000;
        let other_first = (0..trials)
            .filter(|_| !is_local(&order_candidates(&proxies(), &mut rng)[0]))
            .count();

        let ratio = other_first as f64 / trials as f64;
        assert!((ratio - OTHER_FIRST_PROBABILITY).abs() < 0.02, "ratio {}", ratio);
    }

    #[test]
    fn test_only_local_proxies_are_always_first() {
        let mut rng = StdRng::seed_from_u64(9);
        let only_local = vec![
            ProxyConfig::direct("http://localhost:1"),
            ProxyConfig::direct("http://localhost:2"),
        ];
        for _ in 0..100 {
            let ordered = order_candidates(&only_local, &mut rng);
            assert!(ordered.iter().all(is_local));
        }
    }

    #[test]
    fn test_shuffle_visits_every_permutation_of_partition() {
        let mut rng = StdRng::seed_from_u64(5);
        let others = vec![
            ProxyConfig::forwarding("https://a/?"),
            ProxyConfig::forwarding("https://b/?"),
            ProxyConfig::forwarding("https://c/?"),
        ];
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let order: Vec<String> = order_candidates(&others, &mut rng)
                .iter()
                .map(|c| c.label().to_string())
                .collect();
            seen.insert(order);
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_effective_url_variants() {
        let target = "https://csfloat.com/api/v1/listings?limit=30";

        assert_eq!(
            effective_url(&Candidate::Direct, target, MARKETPLACE_ORIGIN),
            target
        );
        assert_eq!(
            effective_url(
                &Candidate::Proxy(ProxyConfig::direct("http://localhost:8010/proxy/")),
                target,
                MARKETPLACE_ORIGIN
            ),
            "http://localhost:8010/proxy/api/v1/listings?limit=30"
        );
        assert_eq!(
            effective_url(
                &Candidate::Proxy(ProxyConfig::forwarding("https://corsproxy.io/?")),
                target,
                MARKETPLACE_ORIGIN
            ),
            "https://corsproxy.io/?https://csfloat.com/api/v1/listings?limit=30"
        );
    }

    #[test]
    fn test_target_url_skips_unset_filters() {
        let fetcher = ListingFetcher::new(Arc::new(MockHttpTransport::new()));
        let url = fetcher.target_url(&ListingQuery::default()).unwrap();
        let parsed = Url::parse(&url).unwrap();
        let keys: Vec<String> = parsed.query_pairs().map(|(k, _)| k.into_owned()).collect();

        assert!(url.starts_with("https://csfloat.com/api/v1/listings?sort_by=most_recent&limit=30"));
        assert_eq!(
            keys,
            vec!["sort_by", "limit", "min_price", "max_price", "category", "_"]
        );
    }

    #[test]
    fn test_target_url_includes_set_filters() {
        let fetcher = ListingFetcher::new(Arc::new(MockHttpTransport::new()));
        let query = ListingQuery {
            listing_type: "buy_now".to_string(),
            def_index: 7,
            max_float: 0.07,
            min_fade: 95.0,
            market_hash_name: Some("AK-47 | Fire Serpent".to_string()),
            ..Default::default()
        };
        let url = fetcher.target_url(&query).unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<String, String> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(pairs["type"], "buy_now");
        assert_eq!(pairs["def_index"], "7");
        assert_eq!(pairs["max_float"], "0.07");
        assert_eq!(pairs["min_fade"], "95");
        assert_eq!(pairs["market_hash_name"], "AK-47 | Fire Serpent");
        assert!(!pairs.contains_key("rarity"));
        assert!(!pairs.contains_key("min_float"));
    }

    #[tokio::test]
    async fn test_fails_over_to_third_candidate() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req| req.url.starts_with("http://localhost:1"))
            .times(1)
            .returning(|_| Err(TransportError::Network("refused".to_string())));
        transport
            .expect_send()
            .withf(|req| req.url.starts_with("http://localhost:2"))
            .times(1)
            .returning(|_| Err(TransportError::Network("refused".to_string())));
        transport
            .expect_send()
            .withf(|req| {
                req.url.starts_with("https://corsproxy.io/?https://csfloat.com/api/v1/listings")
                    && req.header_value("Authorization") == Some("secret-key")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, format!(r#"{{"data":[{}]}}"#, LISTING))));

        let fetcher = ListingFetcher::new(Arc::new(transport));
        let query = ListingQuery {
            api_key: "secret-key".to_string(),
            ..Default::default()
        };
        let candidates = vec![
            Candidate::Proxy(ProxyConfig::direct("http://localhost:1")),
            Candidate::Proxy(ProxyConfig::direct("http://localhost:2")),
            Candidate::Proxy(ProxyConfig::forwarding("https://corsproxy.io/?")),
        ];

        let result = fetcher.fetch_from(&query, candidates).await;

        assert_eq!(result.status, 200);
        assert_eq!(result.proxy_used.as_deref(), Some("https://corsproxy.io/?"));
        assert_eq!(result.listings.len(), 1);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_rate_limit_stops_remaining_candidates() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req| req.url.starts_with("http://localhost:1"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(403, "")));
        transport
            .expect_send()
            .withf(|req| req.url.starts_with("http://localhost:2"))
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(429, "slow down").with_header("X-RateLimit-Reset", "42"))
            });
        transport
            .expect_send()
            .withf(|req| req.url.starts_with("http://localhost:3"))
            .never();

        let fetcher = ListingFetcher::new(Arc::new(transport));
        let candidates = vec![
            Candidate::Proxy(ProxyConfig::direct("http://localhost:1")),
            Candidate::Proxy(ProxyConfig::direct("http://localhost:2")),
            Candidate::Proxy(ProxyConfig::direct("http://localhost:3")),
        ];

        let result = fetcher.fetch_from(&ListingQuery::default(), candidates).await;

        assert_eq!(result.status, 429);
        assert_eq!(result.reset_time, Some(42));
        assert_eq!(result.proxy_used.as_deref(), Some("http://localhost:2"));
        assert!(result.listings.is_empty());
    }

    #[tokio::test]
    async fn test_all_failures_report_last_error() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req| req.url.starts_with("http://localhost:1"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, "")));
        transport
            .expect_send()
            .withf(|req| req.url.starts_with("https://csfloat.com"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(502, "bad gateway")));

        let fetcher = ListingFetcher::new(Arc::new(transport));
        let candidates = vec![
            Candidate::Proxy(ProxyConfig::direct("http://localhost:1")),
            Candidate::Direct,
        ];

        let result = fetcher.fetch_from(&ListingQuery::default(), candidates).await;

        assert_eq!(result.status, 500);
        assert_eq!(result.error.as_deref(), Some("Proxy Direct error: 502"));
        assert_eq!(result.proxy_used, None);
    }

    #[tokio::test]
    async fn test_auth_failure_message_names_proxy() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(403, "")));

        let fetcher = ListingFetcher::new(Arc::new(transport));
        let result = fetcher
            .fetch_from(&ListingQuery::default(), vec![Candidate::Direct])
            .await;

        let error = result.error.unwrap();
        assert!(error.starts_with("Proxy Direct auth failed: 403"));
    }

    #[tokio::test]
    async fn test_non_network_transport_error_is_reported_verbatim() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Request("builder error".to_string())));

        let fetcher = ListingFetcher::new(Arc::new(transport));
        let result = fetcher
            .fetch_from(&ListingQuery::default(), vec![Candidate::Direct])
            .await;

        assert_eq!(
            result.error.as_deref(),
            Some("Proxy Direct failed: request failed: builder error")
        );
    }

    #[tokio::test]
    async fn test_listings_field_fallback() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(HttpResponse::new(
                200,
                format!(r#"{{"listings":[{}, {{"broken":true}}]}}"#, LISTING),
            ))
        });

        let fetcher = ListingFetcher::new(Arc::new(transport));
        let result = fetcher
            .fetch_from(&ListingQuery::default(), vec![Candidate::Direct])
            .await;

        assert_eq!(result.status, 200);
        assert_eq!(result.listings.len(), 1);
        assert_eq!(result.proxy_used.as_deref(), Some("Direct"));
    }
}
