use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Retention policy for chain history.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum HistoryMode {
    /// Keep everything, never purge.
    Archive,
    /// Prune block contents behind the checkpoint, keep all headers.
    Full,
    /// Keep only a bounded recent window; nothing below the caboose.
    Rolling,
}

impl HistoryMode {
    /// History-mode transitions form a strict partial order: history can be
    /// discarded but never reconstructed, so only transitions towards less
    /// retention are permitted.
    pub fn can_switch_to(self, target: HistoryMode) -> bool {
        use HistoryMode::*;
        matches!((self, target), (Archive, _) | (Full, Full) | (Full, Rolling) | (Rolling, Rolling))
    }
}

impl Display for HistoryMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HistoryMode::Archive => "archive",
            HistoryMode::Full => "full",
            HistoryMode::Rolling => "rolling",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::HistoryMode::*;

    #[test]
    fn test_switch_matrix() {
        for mode in [Archive, Full, Rolling] {
            assert!(mode.can_switch_to(mode));
        }
        assert!(Archive.can_switch_to(Full));
        assert!(Archive.can_switch_to(Rolling));
        assert!(Full.can_switch_to(Rolling));
        assert!(!Full.can_switch_to(Archive));
        assert!(!Rolling.can_switch_to(Full));
        assert!(!Rolling.can_switch_to(Archive));
    }
}
