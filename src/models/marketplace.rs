use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingItem {
    pub market_hash_name: String,
    #[serde(default)]
    pub float_value: Option<f64>,
    #[serde(default)]
    pub paint_seed: Option<u32>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub inspect_link: Option<String>,
}

/// Marketplace reference pricing, in cents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingReference {
    #[serde(default)]
    pub base_price: Option<i64>,
    #[serde(default)]
    pub predicted_price: Option<i64>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingSeller {
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub online: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    BuyNow,
    Auction,
}

/// One marketplace listing; `price` is in cents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub created_at: String,
    pub price: i64,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub item: ListingItem,
    #[serde(default)]
    pub reference: Option<ListingReference>,
    #[serde(default)]
    pub is_seller: Option<bool>,
    #[serde(default)]
    pub seller: Option<ListingSeller>,
}

/// A network intermediary for marketplace requests
///
/// A direct proxy stands in for the marketplace origin (the request path is
/// appended to it); any other proxy takes the full target URL appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub is_direct: bool,
}

impl ProxyConfig {
    pub fn direct(url: &str) -> Self {
        Self {
            url: url.to_string(),
            is_direct: true,
        }
    }

    pub fn forwarding(url: &str) -> Self {
        Self {
            url: url.to_string(),
            is_direct: false,
        }
    }

    /// A direct proxy running on this machine
    pub fn is_local(&self) -> bool {
        self.is_direct && (self.url.contains("localhost") || self.url.contains("127.0.0.1"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    MostRecent,
    LowestPrice,
    HighestPrice,
    HighestDiscount,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::MostRecent => "most_recent",
            SortBy::LowestPrice => "lowest_price",
            SortBy::HighestPrice => "highest_price",
            SortBy::HighestDiscount => "highest_discount",
        }
    }
}

/// Filters for one listings request
///
/// Numeric filters use the marketplace's "unset" conventions: `-1` for
/// identifiers, `0`/`1` for float bounds, `0`/`100` for blue and `80`/`100`
/// for fade percentages. Unset filters are left out of the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingQuery {
    pub api_key: String,
    pub proxies: Vec<ProxyConfig>,
    pub sort_by: SortBy,
    pub limit: u32,
    /// Price bounds, in cents
    pub min_price: i64,
    pub max_price: i64,
    pub category: u32,
    /// `"any"` disables the filter
    #[serde(rename = "type")]
    pub listing_type: String,
    pub rarity: i64,
    pub def_index: i64,
    pub paint_index: i64,
    pub paint_seed: i64,
    pub min_float: f64,
    pub max_float: f64,
    pub min_blue: f64,
    pub max_blue: f64,
    pub min_fade: f64,
    pub max_fade: f64,
    pub min_ref_qty: u32,
    pub user_id: Option<String>,
    pub market_hash_name: Option<String>,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            proxies: Vec::new(),
            sort_by: SortBy::MostRecent,
            limit: 30,
            min_price: 500,
            max_price: 100_000,
            category: 0,
            listing_type: "any".to_string(),
            rarity: -1,
            def_index: -1,
            paint_index: -1,
            paint_seed: -1,
            min_float: 0.0,
            max_float: 1.0,
            min_blue: 0.0,
            max_blue: 100.0,
            min_fade: 80.0,
            max_fade: 100.0,
            min_ref_qty: 0,
            user_id: None,
            market_hash_name: None,
        }
    }
}

/// Outcome of one logical listings fetch, however many proxies it took
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub listings: Vec<Listing>,
    pub status: u16,
    /// Seconds until the rate limit resets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
