//! Per-resource cache policy: read key, TTL and the patterns a write invalidates.
//!
//! Invalidation is purely textual. A write to categories drops `menu:*` because
//! menu listings embed category data, not because of any tracked dependency.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub resource: &'static str,
    /// Lookup key; `{param}` segments are filled from the route's path parameters.
    pub read_key: &'static str,
    pub ttl_secs: u64,
    pub invalidates: &'static [&'static str],
}

impl CachePolicy {
    pub fn invalidation_patterns(&self) -> Vec<String> {
        self.invalidates.iter().map(|p| (*p).to_string()).collect()
    }
}

pub const CATEGORIES: CachePolicy = CachePolicy {
    resource: "categories",
    read_key: "categories:all",
    ttl_secs: 7200,
    invalidates: &["categories:*", "menu:*"],
};

/// Menu listings are cached by the handler itself, keyed per category filter;
/// `read_key` is the unfiltered listing.
pub const MENU: CachePolicy = CachePolicy {
    resource: "menu items",
    read_key: MENU_ALL_KEY,
    ttl_secs: 3600,
    invalidates: &["menu:*"],
};

pub const MENU_ALL_KEY: &str = "menu:all";

pub fn menu_category_key(category_id: &str) -> String {
    format!("menu:category:{category_id}")
}

pub const TABLES: CachePolicy = CachePolicy {
    resource: "tables",
    read_key: "tables:all",
    ttl_secs: 1800,
    invalidates: &["tables:*", "tables:detail:*"],
};

pub const TABLE_DETAIL: CachePolicy = CachePolicy {
    resource: "table detail",
    read_key: "tables:detail:{id}",
    ttl_secs: 1800,
    invalidates: &["tables:*", "tables:detail:*"],
};

pub const ORDERS: CachePolicy = CachePolicy {
    resource: "orders",
    read_key: "orders:all",
    ttl_secs: 300,
    invalidates: &["orders:*", "tables:*", "kitchen:*"],
};

pub const KITCHEN: CachePolicy = CachePolicy {
    resource: "kitchen queue",
    read_key: "kitchen:orders",
    ttl_secs: 60,
    invalidates: &["orders:*", "kitchen:*", "reports:*"],
};

pub const SETTINGS: CachePolicy = CachePolicy {
    resource: "settings",
    read_key: "settings:all",
    ttl_secs: 3600,
    invalidates: &["settings:*"],
};

pub const ALL: &[CachePolicy] = &[CATEGORIES, MENU, TABLES, TABLE_DETAIL, ORDERS, KITCHEN, SETTINGS];
