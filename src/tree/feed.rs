use crate::storage::MessageCounts;

/// Recognized feed formats. The raw discriminant is what the `feeds.kind`
/// column stores; rows with any other value are skipped during tree assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss0X,
    Rss2X,
    Rdf,
    Atom10,
}

impl FeedFormat {
    pub fn from_db(kind: i64) -> Option<Self> {
        match kind {
            0 => Some(FeedFormat::Rss0X),
            1 => Some(FeedFormat::Rss2X),
            2 => Some(FeedFormat::Rdf),
            3 => Some(FeedFormat::Atom10),
            _ => None,
        }
    }

    pub fn to_db(self) -> i64 {
        match self {
            FeedFormat::Rss0X => 0,
            FeedFormat::Rss2X => 1,
            FeedFormat::Rdf => 2,
            FeedFormat::Atom10 => 3,
        }
    }
}

/// Per-feed auto-update policy.
///
/// `SpecificInterval` counts scheduler passes: `remaining` is decremented on
/// every decision pass and reset to `initial` when the feed gets scheduled.
/// Invariant: both values are strictly positive and `remaining <= initial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoUpdateMode {
    Disabled,
    GlobalInterval,
    SpecificInterval { initial: i64, remaining: i64 },
}

impl AutoUpdateMode {
    /// Decode the persisted (mode, interval) pair. Unknown modes fall back
    /// to the global interval, a non-positive specific interval is clamped.
    pub fn from_db(update_mode: i64, update_interval: i64) -> Self {
        match update_mode {
            2 => AutoUpdateMode::Disabled,
            1 => {
                let initial = update_interval.max(1);
                AutoUpdateMode::SpecificInterval {
                    initial,
                    remaining: initial,
                }
            }
            _ => AutoUpdateMode::GlobalInterval,
        }
    }

    /// Encode as the persisted (mode, interval) pair.
    pub fn to_db(self) -> (i64, i64) {
        match self {
            AutoUpdateMode::GlobalInterval => (0, 0),
            AutoUpdateMode::SpecificInterval { initial, .. } => (1, initial),
            AutoUpdateMode::Disabled => (2, 0),
        }
    }
}

/// Runtime status of a feed, driven by the external fetch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedStatus {
    #[default]
    Normal,
    NewMessages,
    Error,
}

/// Kind-specific payload of a feed node.
#[derive(Debug, Clone)]
pub struct FeedData {
    /// Store-assigned id (unique within the feeds table).
    pub id: i64,
    pub format: FeedFormat,
    pub url: String,
    pub auto_update: AutoUpdateMode,
    pub counts: MessageCounts,
    pub status: FeedStatus,
}

impl FeedData {
    pub fn new(id: i64, format: FeedFormat, url: impl Into<String>) -> Self {
        Self {
            id,
            format,
            url: url.into(),
            auto_update: AutoUpdateMode::GlobalInterval,
            counts: MessageCounts::default(),
            status: FeedStatus::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        assert_eq!(FeedFormat::from_db(99), None);
        assert_eq!(FeedFormat::from_db(-1), None);
        assert_eq!(FeedFormat::from_db(1), Some(FeedFormat::Rss2X));
    }

    #[test]
    fn specific_interval_is_clamped_positive() {
        let mode = AutoUpdateMode::from_db(1, 0);
        assert_eq!(
            mode,
            AutoUpdateMode::SpecificInterval {
                initial: 1,
                remaining: 1
            }
        );
    }

    #[test]
    fn db_round_trip_preserves_mode() {
        for mode in [
            AutoUpdateMode::Disabled,
            AutoUpdateMode::GlobalInterval,
            AutoUpdateMode::SpecificInterval {
                initial: 7,
                remaining: 7,
            },
        ] {
            let (m, i) = mode.to_db();
            assert_eq!(AutoUpdateMode::from_db(m, i), mode);
        }
    }
}
