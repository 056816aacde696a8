//! Boop Runner - Entry point
//!
//! The browser build drives the simulation from requestAnimationFrame and
//! reflects it into the HUD overlay. The native build runs a short headless
//! demo for smoke testing.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use boop_runner::audio::{AudioManager, SoundEffect};
    use boop_runner::format_elapsed;
    use boop_runner::sim::{ActionKey, ActorId, GameEvent, InputEvent, World};
    use boop_runner::{HighScores, Settings, Tuning};
    use glam::Vec2;
    use wasm_bindgen::prelude::*;

    /// Keyboard stand-in for the two arcade sticks: (up, down, left, right)
    const STICK_KEYS: [[&str; 4]; 2] = [
        ["w", "s", "a", "d"],
        ["ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight"],
    ];

    /// Action buttons per player: (jump, fusion)
    const ACTION_KEYS: [[&str; 2]; 2] = [["q", "e"], [".", "/"]];

    /// Game state container for WASM
    struct Game {
        world: World,
        settings: Settings,
        highscores: HighScores,
        audio: AudioManager,
        /// Keys currently held
        held: HashSet<String>,
        /// Rank on the board once the run is over
        rank: Option<usize>,
        // FPS tracking
        frame_count: u32,
        fps_time: f64,
        fps: u32,
    }

    impl Game {
        fn new(seed: u64, now_ms: f64) -> Self {
            let settings = Settings::load();
            let mut audio = AudioManager::new();
            audio.set_master_volume(settings.master_volume);
            audio.set_sfx_volume(settings.sfx_volume);

            Self {
                world: World::new(Tuning::load(), seed, now_ms),
                settings,
                highscores: HighScores::load(),
                audio,
                held: HashSet::new(),
                rank: None,
                frame_count: 0,
                fps_time: 0.0,
                fps: 0,
            }
        }

        fn key_down(&mut self, key: &str) {
            for actor in ActorId::ALL {
                let [jump, fusion] = ACTION_KEYS[actor.index()];
                let action = if key == jump {
                    Some(ActionKey::Jump)
                } else if key == fusion {
                    Some(ActionKey::Fusion)
                } else {
                    None
                };
                if let Some(key) = action {
                    self.audio.resume();
                    self.world.push_input(InputEvent::Action { actor, key });
                }
            }
            self.held.insert(normalize_key(key));
        }

        fn key_up(&mut self, key: &str) {
            self.held.remove(&normalize_key(key));
        }

        /// Held directions are re-sent every frame, like a polled gamepad
        fn poll_sticks(&mut self) {
            for actor in ActorId::ALL {
                let [up, down, left, right] = STICK_KEYS[actor.index()];
                let axis = |neg: &str, pos: &str| {
                    let held = |k: &str| self.held.contains(&normalize_key(k));
                    held(pos) as i8 as f32 - held(neg) as i8 as f32
                };
                // Screen up is stick -y
                let vector = Vec2::new(axis(left, right), axis(up, down));
                self.world.push_input(InputEvent::Joystick { actor, vector });
            }
        }

        fn update(&mut self, time: f64) {
            self.poll_sticks();
            self.world.tick(time);

            for event in self.world.drain_events() {
                if let Some(effect) = SoundEffect::for_event(&event) {
                    self.audio.play(effect);
                }
                match event {
                    GameEvent::GameOver { score_ms } => self.finish_run(score_ms),
                    GameEvent::Penalty { actor, violation } => {
                        log::info!("Player {} penalty: {:?}", actor.number(), violation);
                    }
                    _ => {}
                }
            }

            self.frame_count += 1;
            if time - self.fps_time >= 1000.0 {
                self.fps = self.frame_count;
                self.frame_count = 0;
                self.fps_time = time;
            }
        }

        fn finish_run(&mut self, score_ms: u64) {
            let name = self.settings.display_name();
            self.rank = self.highscores.record(&name, score_ms, js_sys::Date::now());
            if self.rank.is_some() {
                self.highscores.save();
                self.audio.play(SoundEffect::HighScore);
            }
            log::info!("Game over after {}", format_elapsed(score_ms));
        }

        /// Update the HUD overlay elements
        fn update_hud(&self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let hud = self.world.hud();

            if let Some(el) = document.query_selector("#hud-lives .hud-value").ok().flatten() {
                el.set_text_content(Some(&hud.lives.to_string()));
            }
            if let Some(el) = document.query_selector("#hud-time .hud-value").ok().flatten() {
                el.set_text_content(Some(&format_elapsed(hud.elapsed_ms)));
            }
            if let Some(el) = document.get_element_by_id("hud-fused") {
                let class = if hud.fused { "hud-item" } else { "hud-item hidden" };
                let _ = el.set_attribute("class", class);
            }
            if let Some(el) = document.get_element_by_id("danger-vignette") {
                let strength = if self.settings.effective_danger_vignette() {
                    hud.danger_progress.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let _ = el.set_attribute("style", &format!("opacity: {:.3}", strength));
            }
            if let Some(el) = document.get_element_by_id("hud-fps") {
                if self.settings.show_fps {
                    let _ = el.set_attribute("class", "hud-item");
                    el.set_text_content(Some(&format!("{} FPS", self.fps)));
                } else {
                    let _ = el.set_attribute("class", "hud-item hidden");
                }
            }

            // Start prompt until both players confirm
            if let Some(el) = document.get_element_by_id("start-prompt") {
                let class = if hud.started { "hidden" } else { "" };
                let _ = el.set_attribute("class", class);
            }

            if let Some(el) = document.get_element_by_id("game-over") {
                if hud.game_over {
                    let _ = el.set_attribute("class", "");
                    if let Some(score_el) = document.get_element_by_id("final-time") {
                        score_el.set_text_content(Some(&format_elapsed(hud.elapsed_ms)));
                    }
                    if let Some(board) = document.get_element_by_id("leaderboard") {
                        let rows: Vec<String> = self
                            .highscores
                            .entries
                            .iter()
                            .enumerate()
                            .map(|(i, e)| {
                                let mark = if self.rank == Some(i + 1) { "*" } else { " " };
                                format!("{}{:>2}. {}", mark, i + 1, e.row())
                            })
                            .collect();
                        board.set_text_content(Some(&rows.join("\n")));
                    }
                } else {
                    let _ = el.set_attribute("class", "hidden");
                }
            }
        }
    }

    /// Letters arrive in either case depending on shift
    fn normalize_key(key: &str) -> String {
        if key.chars().count() == 1 {
            key.to_ascii_lowercase()
        } else {
            key.to_string()
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Boop Runner starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let seed = js_sys::Date::now() as u64;
        let now = window.performance().map_or(0.0, |p| p.now());
        let game = Rc::new(RefCell::new(Game::new(seed, now)));
        resize_camera(&game);

        log::info!("Game initialized with seed: {}", seed);

        setup_input_handlers(game.clone());
        setup_restart_button();
        setup_auto_mute(game.clone());

        if let Some(hud) = document.get_element_by_id("hud") {
            let _ = hud.set_attribute("class", "");
        }

        request_animation_frame(game);

        log::info!("Boop Runner running!");
    }

    fn resize_camera(game: &Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let w = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(16.0);
        let h = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(9.0);
        game.borrow_mut()
            .world
            .camera_mut()
            .set_aspect(w as f32, h as f32);
    }

    fn setup_input_handlers(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();

        // Key down
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::KeyboardEvent| {
                if event.repeat() {
                    return;
                }
                if event.key().starts_with("Arrow") || event.key() == "/" {
                    event.prevent_default();
                }
                game.borrow_mut().key_down(&event.key());
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Key up
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::KeyboardEvent| {
                game.borrow_mut().key_up(&event.key());
            });
            let _ = window
                .add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Resize
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                resize_camera(&game);
            });
            let _ = window
                .add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();
            g.update(time);
            g.update_hud();
        }

        request_animation_frame(game);
    }

    /// A new run starts from a fresh page
    fn setup_restart_button() {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        if let Some(btn) = document.get_element_by_id("restart-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                if let Some(window) = web_sys::window() {
                    let _ = window.location().reload();
                }
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_auto_mute(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        let document_clone = document.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let hidden = document_clone.visibility_state() == web_sys::VisibilityState::Hidden;
            let mut g = game.borrow_mut();
            if g.settings.mute_on_blur {
                g.audio.set_muted(hidden);
                log::info!("Audio {}", if hidden { "muted (tab hidden)" } else { "restored" });
            }
        });
        let _ = document
            .add_event_listener_with_callback("visibilitychange", closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Boop Runner (native) starting...");
    log::info!("Native mode is headless - run with `trunk serve` for the web version");

    demo_run(0xB00F, 20_000.0);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Both players start the run together and hold right until the danger
/// front or a rule catches them.
#[cfg(not(target_arch = "wasm32"))]
fn demo_run(seed: u64, duration_ms: f64) {
    use boop_runner::sim::{ActionKey, ActorId, GameEvent, InputEvent, World};
    use boop_runner::{Tuning, format_elapsed};

    const FRAME_MS: f64 = 1000.0 / 60.0;

    let mut world = World::new(Tuning::load(), seed, 0.0);
    for actor in ActorId::ALL {
        world.push_input(InputEvent::Action {
            actor,
            key: ActionKey::Fusion,
        });
    }

    let mut t = 0.0;
    while t < duration_ms {
        t += FRAME_MS;
        for actor in ActorId::ALL {
            world.push_input(InputEvent::Joystick {
                actor,
                vector: glam::Vec2::X,
            });
        }
        world.tick(t);

        for event in world.drain_events() {
            match event {
                GameEvent::ChunkSpawned { .. } | GameEvent::ChunkRetired { .. } => {
                    log::debug!("{:?}", event)
                }
                _ => log::info!("[{}] {:?}", format_elapsed(world.elapsed_ms()), event),
            }
        }
        if world.session().has_lost {
            break;
        }
    }

    let hud = world.hud();
    println!(
        "Demo finished: survived {} with {} lives, {} chunks live",
        format_elapsed(hud.elapsed_ms),
        hud.lives,
        world.sequencer().len()
    );
}
