//! Site to channel mapping.
//!
//! One relation, two index views. `register` maintains both sides
//! atomically so the maps can never disagree about a pairing.

use std::collections::HashMap;

/// Bijection between wiki sites and the channels carrying their traffic.
///
/// Owned by the engine task; no interior locking.
#[derive(Debug, Default)]
pub struct SiteRegistry {
    by_site: HashMap<String, String>,
    by_channel: HashMap<String, String>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a site/channel pair, evicting any stale mapping either
    /// key previously had.
    pub fn register(&mut self, site: impl Into<String>, channel: impl Into<String>) {
        let site = site.into();
        let channel = channel.into();
        if let Some(old_channel) = self.by_site.remove(&site) {
            self.by_channel.remove(&old_channel);
        }
        if let Some(old_site) = self.by_channel.remove(&channel) {
            self.by_site.remove(&old_site);
        }
        self.by_site.insert(site.clone(), channel.clone());
        self.by_channel.insert(channel, site);
    }

    pub fn site_for_channel(&self, channel: &str) -> Option<&str> {
        self.by_channel.get(channel).map(String::as_str)
    }

    pub fn channel_for_site(&self, site: &str) -> Option<&str> {
        self.by_site.get(site).map(String::as_str)
    }

    /// All registered channels, in no particular order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.by_channel.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_site.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_site.is_empty()
    }
}
