use crossterm::{queue, style::ResetColor, terminal};
use std::io::{self, Write};
use std::time::Instant;

use super::{
    halfblock, AppResult, AppState, CameraMode, FrameTimer, Renderer, RendererKind, FRAME_TARGET,
};
use crate::input::state::apply_movement_from_held_keys;

fn update_orbit(app_state: &mut AppState, delta_time: f32) {
    const ORBIT_SPEED: f32 = 0.55;
    app_state.orbit_angle += ORBIT_SPEED * delta_time;

    let target = app_state.orbit_target;
    app_state.camera.position.x = target.x + app_state.orbit_radius * app_state.orbit_angle.cos();
    app_state.camera.position.z = target.z + app_state.orbit_radius * app_state.orbit_angle.sin();
    app_state.camera.position.y = target.y + app_state.orbit_height;

    crate::camera::look_at_target(&mut app_state.camera, target);
}

pub fn render_frame(
    app_state: &mut AppState,
    terminal_size: (u16, u16),
    stdout: &mut impl Write,
) -> AppResult<()> {
    let cols = terminal_size.0.max(1);
    let rows = terminal_size.1.max(1);

    let term_cols = cols as usize;
    let term_rows = rows as usize;

    let ss = app_state.supersample_factor.max(1) as usize;
    let ss_width = term_cols * ss;
    let ss_height = term_rows * 2 * ss;

    super::pipeline::resize_render_state(&mut app_state.render_state, ss_width, ss_height);
    super::pipeline::clear_framebuffer(&mut app_state.render_state);
    app_state.frame_timer = FrameTimer::default();

    // Field-wise borrow so the selected variant can read the scene and
    // camera while writing the pixel target.
    let stats = {
        let AppState {
            scene,
            camera,
            render_state,
            renderer_kind,
            splat_renderer,
            point_cloud_renderer,
            frame_timer,
            ..
        } = app_state;

        let renderer: &mut dyn Renderer = match renderer_kind {
            RendererKind::GaussianSplat => splat_renderer,
            RendererKind::PointCloud => point_cloud_renderer,
        };
        renderer.render(scene, camera, render_state, Some(frame_timer))?
    };
    app_state.visible_splat_count = stats.visible_count;

    let cells = if ss == 1 {
        halfblock::map_rows_to_cells(
            &app_state.render_state.framebuffer,
            ss_width,
            ss_height,
            term_cols,
            term_rows,
        )
    } else {
        halfblock::downsample_to_terminal(
            &app_state.render_state.framebuffer,
            ss_width,
            ss_height,
            term_cols,
            term_rows,
            ss,
        )
    };
    app_state.halfblock_cells = cells;

    halfblock::emit_cells(
        &app_state.halfblock_cells,
        term_cols,
        term_rows,
        app_state.show_hud,
        app_state.use_truecolor,
        stdout,
    )?;

    if app_state.show_hud {
        super::hud::draw_hud(app_state, cols, rows, ss, stdout)?;
    }

    queue!(stdout, ResetColor)?;
    stdout.flush()?;
    Ok(())
}

pub fn run_app_loop(
    app_state: &mut AppState,
    input_rx: &crate::input::thread::InputReceiver,
    stdout: &mut io::BufWriter<io::Stdout>,
) -> AppResult<()> {
    loop {
        let frame_start = Instant::now();

        // Drain all pending input events -- never skip
        if crate::input::drain_input_events(app_state, input_rx)? {
            break;
        }

        let now = Instant::now();
        let delta_time = now
            .duration_since(app_state.last_frame_time)
            .as_secs_f32()
            .max(1e-6);
        app_state.last_frame_time = now;

        match app_state.camera_mode {
            CameraMode::Free => apply_movement_from_held_keys(app_state, delta_time),
            CameraMode::Orbit => update_orbit(app_state, delta_time),
        }

        let terminal_size = terminal::size()?;
        render_frame(app_state, terminal_size, stdout)?;

        app_state.frame_count += 1;
        let instant_fps = 1.0 / delta_time;
        app_state.fps = if app_state.fps <= 0.01 {
            instant_fps
        } else {
            0.90 * app_state.fps + 0.10 * instant_fps
        };

        let spent = frame_start.elapsed();
        if spent < FRAME_TARGET {
            std::thread::sleep(FRAME_TARGET - spent);
        }
    }

    Ok(())
}
