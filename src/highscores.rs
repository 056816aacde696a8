//! Local leaderboard
//!
//! A run's score is how long the pair survived. The ten longest runs are kept
//! in LocalStorage; posting to a remote board is the host page's business.

use serde::{Deserialize, Serialize};

use crate::format_elapsed;

/// Maximum number of runs to keep
pub const MAX_HIGH_SCORES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    pub username: String,
    /// Survival time
    pub elapsed_ms: u64,
    /// Unix timestamp (ms) of the run
    pub timestamp: f64,
}

impl HighScoreEntry {
    /// `"NAME  mm:ss:mmm"` row for the game-over screen
    pub fn row(&self) -> String {
        format!("{:<12} {}", self.username, format_elapsed(self.elapsed_ms))
    }
}

/// Longest runs first
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "boop_runner_highscores";

    pub fn new() -> Self {
        Self::default()
    }

    /// Where a run of `elapsed_ms` would land (1-indexed), if it makes the board
    pub fn potential_rank(&self, elapsed_ms: u64) -> Option<usize> {
        if elapsed_ms == 0 {
            return None;
        }
        let rank = self
            .entries
            .iter()
            .position(|e| elapsed_ms > e.elapsed_ms)
            .unwrap_or(self.entries.len());
        (rank < MAX_HIGH_SCORES).then_some(rank + 1)
    }

    pub fn qualifies(&self, elapsed_ms: u64) -> bool {
        self.potential_rank(elapsed_ms).is_some()
    }

    /// Insert a finished run; returns its rank if it made the board
    pub fn record(&mut self, username: &str, elapsed_ms: u64, timestamp: f64) -> Option<usize> {
        let rank = self.potential_rank(elapsed_ms)?;
        self.entries.insert(
            rank - 1,
            HighScoreEntry {
                username: username.to_string(),
                elapsed_ms,
                timestamp,
            },
        );
        self.entries.truncate(MAX_HIGH_SCORES);
        log::info!("Run of {} ranked #{}", format_elapsed(elapsed_ms), rank);
        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best(&self) -> Option<&HighScoreEntry> {
        self.entries.first()
    }

    /// Load the board from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(scores) = serde_json::from_str::<HighScores>(&json) {
                    log::info!("Loaded {} leaderboard entries", scores.entries.len());
                    return scores;
                }
            }
        }

        log::info!("No leaderboard found, starting fresh");
        Self::new()
    }

    /// Save the board to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Leaderboard saved ({} entries)", self.entries.len());
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::new()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

/// Coarse "how long ago" label for a run timestamp
#[cfg(target_arch = "wasm32")]
pub fn format_date(timestamp: f64) -> String {
    let mins = ((js_sys::Date::now() - timestamp) / 60_000.0).max(0.0).floor() as u64;
    match mins {
        0 => "Just now".to_string(),
        1..=59 => format!("{} min ago", mins),
        60..=1439 => format!("{} h ago", mins / 60),
        _ => format!("{} d ago", mins / 1440),
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn format_date(_timestamp: f64) -> String {
    "N/A".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_runs_first() {
        let mut scores = HighScores::new();
        assert_eq!(scores.record("a", 5_000, 0.0), Some(1));
        assert_eq!(scores.record("b", 9_000, 0.0), Some(1));
        assert_eq!(scores.record("c", 7_000, 0.0), Some(2));
        let names: Vec<_> = scores.entries.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, ["b", "c", "a"]);
        assert_eq!(scores.best().map(|e| e.elapsed_ms), Some(9_000));
    }

    #[test]
    fn test_board_is_capped() {
        let mut scores = HighScores::new();
        for i in 1..=MAX_HIGH_SCORES as u64 {
            scores.record("p", i * 1000, 0.0);
        }
        assert!(!scores.qualifies(500));
        assert!(!scores.qualifies(0));
        assert_eq!(scores.record("late", 500, 0.0), None);
        assert_eq!(scores.record("top", 60_000, 0.0), Some(1));
        assert_eq!(scores.entries.len(), MAX_HIGH_SCORES);
        assert_eq!(scores.entries.last().map(|e| e.elapsed_ms), Some(2000));
    }

    #[test]
    fn test_row_format() {
        let entry = HighScoreEntry {
            username: "duo".into(),
            elapsed_ms: 83_042,
            timestamp: 0.0,
        };
        assert!(entry.row().ends_with("01:23:042"));
    }
}
