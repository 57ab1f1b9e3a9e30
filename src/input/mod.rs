pub mod state;
pub mod thread;

use crate::camera;
use crate::math::Vec3;
use crate::render::{AppState, CameraMode};
use crossterm::event::{Event, KeyCode, KeyEventKind};
use std::sync::mpsc::{Receiver, TryRecvError};

pub type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

const SPLAT_SCALE_STEP: f32 = 0.05;

pub fn drain_input_events(
    app_state: &mut AppState,
    input_rx: &Receiver<crate::input::thread::InputMessage>,
) -> AppResult<bool> {
    loop {
        match input_rx.try_recv() {
            Ok(crate::input::thread::InputMessage::Event(event)) => {
                handle_input_event(app_state, event)?;
                if app_state.input_state.quit_requested {
                    return Ok(true);
                }
            }
            Ok(crate::input::thread::InputMessage::ReadError(err)) => {
                return Err(format!("Input thread read failed: {err}").into());
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                return Err("Input channel disconnected".into());
            }
        }
    }

    Ok(app_state.input_state.quit_requested)
}

/// Transition from Free camera to Orbit mode.
///
/// Computes the orbit target as a point along the camera's forward direction,
/// then derives orbit parameters (radius, angle, height offset) from the
/// camera's current position relative to that target.
fn transition_to_orbit(app_state: &mut AppState) {
    // Orbit target: point 5 units ahead along camera forward direction
    let target = app_state.camera.position + app_state.camera.forward * 5.0;
    app_state.orbit_target = target;

    let dx = app_state.camera.position.x - target.x;
    let dz = app_state.camera.position.z - target.z;
    app_state.orbit_radius = (dx * dx + dz * dz).sqrt().max(0.5);
    app_state.orbit_angle = dz.atan2(dx);
    app_state.orbit_height = app_state.camera.position.y - target.y;

    // Clear held movement keys so WASD state doesn't leak
    app_state.input_state.held = crate::input::state::HeldMovementKeys::default();
    app_state.camera_mode = CameraMode::Orbit;
}

/// Transition from Orbit mode back to Free camera.
///
/// Keeps the camera at its current position and sets yaw/pitch to face
/// the orbit target, so the view is seamless.
fn transition_to_free(app_state: &mut AppState) {
    camera::look_at_target(&mut app_state.camera, app_state.orbit_target);
    app_state.camera_mode = CameraMode::Free;
}

fn adjust_splat_scale(app_state: &mut AppState, delta: f32) {
    app_state.splat_scale = (app_state.splat_scale + delta).clamp(0.0, 1.5);
    app_state.splat_renderer.set_scaling(app_state.splat_scale);
}

pub fn handle_input_event(app_state: &mut AppState, event: Event) -> AppResult<()> {
    match event {
        Event::Key(key_event) => {
            // Track held WASD keys (press/repeat/release) — only meaningful in Free mode,
            // but we track state always and just ignore it in Orbit's movement path.
            if let KeyCode::Char(c) = key_event.code {
                let lc = c.to_ascii_lowercase();
                if matches!(
                    key_event.kind,
                    KeyEventKind::Press | KeyEventKind::Repeat | KeyEventKind::Release
                ) {
                    let pressed = key_event.kind != KeyEventKind::Release;
                    match lc {
                        'w' => app_state.input_state.held.forward = pressed,
                        's' => app_state.input_state.held.back = pressed,
                        'a' => app_state.input_state.held.left = pressed,
                        'd' => app_state.input_state.held.right = pressed,
                        _ => {}
                    }
                }
            }

            // Only process press/repeat for discrete actions below
            if !matches!(key_event.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                return Ok(());
            }

            match key_event.code {
                KeyCode::Esc => app_state.input_state.quit_requested = true,
                KeyCode::Tab => app_state.show_hud = !app_state.show_hud,
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    app_state.move_speed = (app_state.move_speed * 1.2).min(10.0);
                }
                KeyCode::Char('-') | KeyCode::Char('_') => {
                    app_state.move_speed = (app_state.move_speed / 1.2).max(0.01);
                }
                KeyCode::Char('[') => adjust_splat_scale(app_state, -SPLAT_SCALE_STEP),
                KeyCode::Char(']') => adjust_splat_scale(app_state, SPLAT_SCALE_STEP),
                KeyCode::Char(' ') => match app_state.camera_mode {
                    CameraMode::Free => transition_to_orbit(app_state),
                    CameraMode::Orbit => transition_to_free(app_state),
                },

                // Arrow keys: modal behavior
                KeyCode::Up => match app_state.camera_mode {
                    CameraMode::Free => {
                        camera::adjust_pitch(&mut app_state.camera, 0.08 * app_state.move_speed);
                    }
                    CameraMode::Orbit => {
                        app_state.orbit_height += 0.15 * app_state.move_speed;
                    }
                },
                KeyCode::Down => match app_state.camera_mode {
                    CameraMode::Free => {
                        camera::adjust_pitch(&mut app_state.camera, -0.08 * app_state.move_speed);
                    }
                    CameraMode::Orbit => {
                        app_state.orbit_height -= 0.15 * app_state.move_speed;
                    }
                },
                KeyCode::Left => match app_state.camera_mode {
                    CameraMode::Free => {
                        camera::adjust_yaw(&mut app_state.camera, -0.08 * app_state.move_speed);
                    }
                    CameraMode::Orbit => {
                        // Manual orbit nudge (in addition to auto-orbit)
                        app_state.orbit_angle -= 0.1 * app_state.move_speed;
                    }
                },
                KeyCode::Right => match app_state.camera_mode {
                    CameraMode::Free => {
                        camera::adjust_yaw(&mut app_state.camera, 0.08 * app_state.move_speed);
                    }
                    CameraMode::Orbit => {
                        app_state.orbit_angle += 0.1 * app_state.move_speed;
                    }
                },

                KeyCode::Char(c) => match c.to_ascii_lowercase() {
                    'q' => app_state.input_state.quit_requested = true,
                    'm' => {
                        app_state.renderer_kind = app_state.renderer_kind.next();
                    }
                    'r' => {
                        camera::reset(&mut app_state.camera);
                        app_state.camera_mode = CameraMode::Free;
                        app_state.orbit_target = Vec3::ZERO;
                        app_state.orbit_angle = 0.0;
                        app_state.orbit_radius = 5.0;
                        app_state.orbit_height = 0.0;
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        Event::FocusLost => {
            app_state.input_state.held = crate::input::state::HeldMovementKeys::default();
        }
        Event::Resize(_, _) => {}
        _ => {}
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::make_state;
    use super::*;
    use crate::render::RendererKind;
    use std::sync::mpsc;

    #[test]
    fn held_keys_toggle_on_press_and_release() {
        let mut app = make_state();
        handle_input_event(
            &mut app,
            Event::Key(crossterm::event::KeyEvent::new(
                KeyCode::Char('w'),
                crossterm::event::KeyModifiers::NONE,
            )),
        )
        .expect("press should succeed");
        assert!(app.input_state.held.forward);

        let release = crossterm::event::KeyEvent {
            code: KeyCode::Char('w'),
            modifiers: crossterm::event::KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: crossterm::event::KeyEventState::NONE,
        };
        handle_input_event(&mut app, Event::Key(release)).expect("release should succeed");
        assert!(!app.input_state.held.forward);
    }

    #[test]
    fn drain_consumes_all_queued_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(crate::input::thread::InputMessage::Event(Event::Key(
            crossterm::event::KeyEvent::new(
                KeyCode::Char('w'),
                crossterm::event::KeyModifiers::NONE,
            ),
        )))
        .expect("send w");
        tx.send(crate::input::thread::InputMessage::Event(Event::Key(
            crossterm::event::KeyEvent::new(
                KeyCode::Char('a'),
                crossterm::event::KeyModifiers::NONE,
            ),
        )))
        .expect("send a");

        let mut app = make_state();
        let quit = drain_input_events(&mut app, &rx).expect("drain should succeed");
        assert!(!quit);
        assert!(app.input_state.held.forward);
        assert!(app.input_state.held.left);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn speed_keys_adjust_move_speed() {
        let mut app = make_state();
        let base = app.move_speed;
        handle_input_event(
            &mut app,
            Event::Key(crossterm::event::KeyEvent::new(
                KeyCode::Char('='),
                crossterm::event::KeyModifiers::NONE,
            )),
        )
        .expect("increase speed");
        assert!(app.move_speed > base);

        let increased = app.move_speed;
        handle_input_event(
            &mut app,
            Event::Key(crossterm::event::KeyEvent::new(
                KeyCode::Char('_'),
                crossterm::event::KeyModifiers::SHIFT,
            )),
        )
        .expect("decrease speed");
        assert!(app.move_speed < increased);
    }

    #[test]
    fn renderer_key_toggles_between_variants() {
        let mut app = make_state();
        assert_eq!(app.renderer_kind, RendererKind::GaussianSplat);
        handle_input_event(
            &mut app,
            Event::Key(crossterm::event::KeyEvent::new(
                KeyCode::Char('m'),
                crossterm::event::KeyModifiers::NONE,
            )),
        )
        .expect("toggle renderer");
        assert_eq!(app.renderer_kind, RendererKind::PointCloud);
        handle_input_event(
            &mut app,
            Event::Key(crossterm::event::KeyEvent::new(
                KeyCode::Char('m'),
                crossterm::event::KeyModifiers::NONE,
            )),
        )
        .expect("toggle back");
        assert_eq!(app.renderer_kind, RendererKind::GaussianSplat);
    }

    #[test]
    fn scale_keys_clamp_to_range() {
        let mut app = make_state();
        for _ in 0..100 {
            handle_input_event(
                &mut app,
                Event::Key(crossterm::event::KeyEvent::new(
                    KeyCode::Char(']'),
                    crossterm::event::KeyModifiers::NONE,
                )),
            )
            .expect("scale up");
        }
        assert!((app.splat_scale - 1.5).abs() < 1e-6);
        assert!((app.splat_renderer.scaling() - 1.5).abs() < 1e-6);

        for _ in 0..100 {
            handle_input_event(
                &mut app,
                Event::Key(crossterm::event::KeyEvent::new(
                    KeyCode::Char('['),
                    crossterm::event::KeyModifiers::NONE,
                )),
            )
            .expect("scale down");
        }
        assert!(app.splat_scale.abs() < 1e-6);
    }

    #[test]
    fn focus_lost_clears_held_movement() {
        let mut app = make_state();
        app.input_state.held.forward = true;
        app.input_state.held.left = true;

        handle_input_event(&mut app, Event::FocusLost).expect("focus lost should succeed");
        assert!(!app.input_state.held.forward);
        assert!(!app.input_state.held.left);
    }
}
