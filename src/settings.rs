//! Player preferences
//!
//! Persisted separately from the leaderboard in LocalStorage.

use serde::{Deserialize, Serialize};

/// Game settings/preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Presentation ===
    /// Red edge glow as the danger front closes in
    pub danger_vignette: bool,
    /// Fusion merge/split animation
    pub fusion_animation: bool,

    // === HUD ===
    /// Show FPS counter
    pub show_fps: bool,
    /// Name submitted with scores
    pub username: String,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Mute when the tab is hidden
    pub mute_on_blur: bool,

    // === Accessibility ===
    /// Reduced motion (no vignette pulse, instant fusion)
    pub reduced_motion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            danger_vignette: true,
            fusion_animation: true,

            show_fps: false,
            username: String::from("PLAYERS"),

            master_volume: 0.8,
            sfx_volume: 1.0,
            mute_on_blur: true,

            reduced_motion: false,
        }
    }
}

impl Settings {
    /// Effective vignette (respects reduced_motion)
    pub fn effective_danger_vignette(&self) -> bool {
        self.danger_vignette && !self.reduced_motion
    }

    /// Effective fusion animation (respects reduced_motion)
    pub fn effective_fusion_animation(&self) -> bool {
        self.fusion_animation && !self.reduced_motion
    }

    /// Gain applied to sound effects
    pub fn effective_sfx_volume(&self) -> f32 {
        (self.master_volume * self.sfx_volume).clamp(0.0, 1.0)
    }

    /// Username trimmed to something a leaderboard row can show
    pub fn display_name(&self) -> String {
        let name: String = self.username.trim().chars().take(12).collect();
        if name.is_empty() {
            String::from("PLAYERS")
        } else {
            name
        }
    }

    /// LocalStorage key
    const STORAGE_KEY: &'static str = "boop_runner_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(settings) = serde_json::from_str(&json) {
                    log::info!("Loaded settings from LocalStorage");
                    return settings;
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduced_motion_overrides_effects() {
        let mut settings = Settings::default();
        assert!(settings.effective_danger_vignette());
        settings.reduced_motion = true;
        assert!(!settings.effective_danger_vignette());
        assert!(!settings.effective_fusion_animation());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"username":"  duo  "}"#).unwrap();
        assert_eq!(settings.display_name(), "duo");
        assert_eq!(settings.master_volume, 0.8);
        assert!((settings.effective_sfx_volume() - 0.8).abs() < 1e-6);
    }
}
