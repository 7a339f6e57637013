//! Destination resolvers.

use resequencer_config::ResequencerConfig;
use resequencer_core::{Destination, DestinationResolver, SequencedItem};

/// Sends a run wherever its first item asked, or to a default destination.
#[derive(Debug, Clone)]
pub struct ReplyToResolver {
    default: Destination,
}

impl ReplyToResolver {
    pub fn new(default: impl Into<Destination>) -> Self {
        Self {
            default: default.into(),
        }
    }

    pub fn from_config(config: &ResequencerConfig) -> Self {
        Self::new(config.default_destination())
    }
}

impl DestinationResolver for ReplyToResolver {
    fn resolve(&self, first: &SequencedItem) -> Destination {
        first
            .reply_to
            .clone()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Sends every run to the same destination.
#[derive(Debug, Clone)]
pub struct StaticResolver(pub Destination);

impl DestinationResolver for StaticResolver {
    fn resolve(&self, _first: &SequencedItem) -> Destination {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_to_wins_over_default() {
        let resolver = ReplyToResolver::new("output");
        let item = SequencedItem::new("a", 0, 1).with_reply_to("billing");
        assert_eq!(resolver.resolve(&item), Destination::from("billing"));
    }

    #[test]
    fn default_used_without_reply_to() {
        let resolver = ReplyToResolver::from_config(&ResequencerConfig::default());
        let item = SequencedItem::new("a", 0, 1);
        assert_eq!(resolver.resolve(&item), Destination::from("output"));
    }

    #[test]
    fn static_resolver_ignores_item() {
        let resolver = StaticResolver(Destination::from("audit"));
        let item = SequencedItem::new("a", 0, 1).with_reply_to("billing");
        assert_eq!(resolver.resolve(&item), Destination::from("audit"));
    }
}
