//! Audio cues using the Web Audio API
//!
//! Every cue is a short stack of oscillator tones, so no sound files are
//! needed. The cue table is plain data and is shared with native builds; only
//! [`AudioManager`] touches the browser.

use crate::sim::GameEvent;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Both players confirmed the start
    Start,
    /// Synchronized jump
    Jump,
    FusionOn,
    FusionOff,
    /// Slowdown button pressed
    Button,
    /// Rule violation cost a life
    Penalty,
    GameOver,
    /// Run made the leaderboard
    HighScore,
}

/// Oscillator shape, mirrored from Web Audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

/// One oscillator: exponential pitch glide plus a decaying gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub wave: Wave,
    pub from_hz: f32,
    pub to_hz: f32,
    /// Peak gain before volume scaling
    pub gain: f32,
    /// Offset from the cue start (seconds)
    pub delay: f64,
    pub length: f64,
}

const fn tone(wave: Wave, from_hz: f32, to_hz: f32, gain: f32, delay: f64, length: f64) -> Tone {
    Tone {
        wave,
        from_hz,
        to_hz,
        gain,
        delay,
        length,
    }
}

const START: &[Tone] = &[
    tone(Wave::Square, 523.0, 523.0, 0.25, 0.0, 0.1),
    tone(Wave::Square, 659.0, 659.0, 0.25, 0.1, 0.1),
    tone(Wave::Square, 784.0, 784.0, 0.3, 0.2, 0.2),
];
const JUMP: &[Tone] = &[tone(Wave::Sine, 220.0, 660.0, 0.4, 0.0, 0.15)];
const FUSION_ON: &[Tone] = &[
    tone(Wave::Triangle, 200.0, 800.0, 0.35, 0.0, 0.3),
    tone(Wave::Sine, 400.0, 1600.0, 0.15, 0.05, 0.25),
];
const FUSION_OFF: &[Tone] = &[
    tone(Wave::Triangle, 800.0, 200.0, 0.35, 0.0, 0.3),
    tone(Wave::Sine, 1600.0, 400.0, 0.15, 0.05, 0.25),
];
const BUTTON: &[Tone] = &[
    tone(Wave::Sine, 880.0, 880.0, 0.3, 0.0, 0.08),
    tone(Wave::Sine, 1320.0, 1320.0, 0.3, 0.08, 0.15),
];
const PENALTY: &[Tone] = &[
    tone(Wave::Sawtooth, 180.0, 90.0, 0.35, 0.0, 0.25),
    tone(Wave::Square, 60.0, 40.0, 0.2, 0.0, 0.3),
];
const GAME_OVER: &[Tone] = &[
    tone(Wave::Sawtooth, 392.0, 370.0, 0.3, 0.0, 0.3),
    tone(Wave::Sawtooth, 311.0, 294.0, 0.3, 0.3, 0.3),
    tone(Wave::Sawtooth, 262.0, 131.0, 0.35, 0.6, 0.8),
];
const HIGH_SCORE: &[Tone] = &[
    tone(Wave::Square, 784.0, 784.0, 0.2, 0.0, 0.1),
    tone(Wave::Square, 988.0, 988.0, 0.2, 0.1, 0.1),
    tone(Wave::Square, 1175.0, 1175.0, 0.2, 0.2, 0.1),
    tone(Wave::Sine, 1568.0, 1568.0, 0.25, 0.3, 0.4),
];

impl SoundEffect {
    /// Cue for a world event, if it has one
    pub fn for_event(event: &GameEvent) -> Option<Self> {
        match event {
            GameEvent::SessionStarted => Some(SoundEffect::Start),
            GameEvent::Jumped => Some(SoundEffect::Jump),
            GameEvent::FusionChanged { fused: true } => Some(SoundEffect::FusionOn),
            GameEvent::FusionChanged { fused: false } => Some(SoundEffect::FusionOff),
            GameEvent::ButtonPressed => Some(SoundEffect::Button),
            GameEvent::Penalty { .. } => Some(SoundEffect::Penalty),
            GameEvent::GameOver { .. } => Some(SoundEffect::GameOver),
            GameEvent::LivesChanged { .. }
            | GameEvent::ChunkSpawned { .. }
            | GameEvent::ChunkRetired { .. } => None,
        }
    }

    pub fn tones(self) -> &'static [Tone] {
        match self {
            SoundEffect::Start => START,
            SoundEffect::Jump => JUMP,
            SoundEffect::FusionOn => FUSION_ON,
            SoundEffect::FusionOff => FUSION_OFF,
            SoundEffect::Button => BUTTON,
            SoundEffect::Penalty => PENALTY,
            SoundEffect::GameOver => GAME_OVER,
            SoundEffect::HighScore => HIGH_SCORE,
        }
    }

    /// Total cue length (seconds)
    pub fn duration(self) -> f64 {
        self.tones()
            .iter()
            .map(|t| t.delay + t.length)
            .fold(0.0, f64::max)
    }
}

#[cfg(target_arch = "wasm32")]
pub use manager::AudioManager;

#[cfg(target_arch = "wasm32")]
mod manager {
    use web_sys::{AudioContext, AudioContextState, GainNode, OscillatorNode, OscillatorType};

    use super::{SoundEffect, Tone, Wave};

    /// Audio manager for the game
    pub struct AudioManager {
        ctx: Option<AudioContext>,
        master_volume: f32,
        sfx_volume: f32,
        muted: bool,
    }

    impl Default for AudioManager {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AudioManager {
        pub fn new() -> Self {
            // May fail outside a secure context
            let ctx = AudioContext::new().ok();
            if ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
            }
            Self {
                ctx,
                master_volume: 0.8,
                sfx_volume: 1.0,
                muted: false,
            }
        }

        /// Resume audio context (required after user gesture)
        pub fn resume(&self) {
            if let Some(ctx) = &self.ctx {
                let _ = ctx.resume();
            }
        }

        pub fn set_master_volume(&mut self, vol: f32) {
            self.master_volume = vol.clamp(0.0, 1.0);
        }

        pub fn set_sfx_volume(&mut self, vol: f32) {
            self.sfx_volume = vol.clamp(0.0, 1.0);
        }

        pub fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }

        fn effective_volume(&self) -> f32 {
            if self.muted {
                0.0
            } else {
                self.master_volume * self.sfx_volume
            }
        }

        /// Fire and forget
        pub fn play(&self, effect: SoundEffect) {
            let vol = self.effective_volume();
            if vol <= 0.0 {
                return;
            }
            let Some(ctx) = &self.ctx else { return };

            if ctx.state() == AudioContextState::Suspended {
                let _ = ctx.resume();
            }

            let t = ctx.current_time();
            for tone in effect.tones() {
                play_tone(ctx, tone, t, vol);
            }
        }
    }

    fn create_osc(ctx: &AudioContext, wave: Wave) -> Option<(OscillatorNode, GainNode)> {
        let osc = ctx.create_oscillator().ok()?;
        let gain = ctx.create_gain().ok()?;

        osc.set_type(match wave {
            Wave::Sine => OscillatorType::Sine,
            Wave::Square => OscillatorType::Square,
            Wave::Triangle => OscillatorType::Triangle,
            Wave::Sawtooth => OscillatorType::Sawtooth,
        });
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(&ctx.destination()).ok()?;

        Some((osc, gain))
    }

    fn play_tone(ctx: &AudioContext, tone: &Tone, now: f64, vol: f32) {
        let Some((osc, gain)) = create_osc(ctx, tone.wave) else {
            return;
        };
        let start = now + tone.delay;
        let end = start + tone.length;

        gain.gain().set_value_at_time(0.0, now).ok();
        gain.gain().set_value_at_time(vol * tone.gain, start).ok();
        gain.gain().exponential_ramp_to_value_at_time(0.01, end).ok();
        osc.frequency().set_value_at_time(tone.from_hz, start).ok();
        if tone.to_hz != tone.from_hz {
            osc.frequency()
                .exponential_ramp_to_value_at_time(tone.to_hz, end)
                .ok();
        }

        osc.start_with_when(start).ok();
        osc.stop_with_when(end + 0.02).ok();
    }
}
