use log::debug;

use crate::camera::{aspect_ratio, CameraController, MoveDirection, Projection};
use crate::car::{CarMotion, CarPhase};
use crate::config::ViewerConfig;
use crate::drawable::DrawableRegistry;
use crate::error::ViewerError;
use crate::input::{Action, InputEvent, KeyBindings};
use crate::scene::{Frame, RenderMode, SceneComposer};
use crate::scheduler::FrameSource;

/// The viewer's mutable state: camera, car, render mode and pointer
/// capture, plus the read-only drawable registry built at start-up.
///
/// All mutation happens through [`Viewer::handle_input`] and
/// [`FrameSource::advance`] on the single thread that also renders.
#[derive(Debug, Clone)]
pub struct Viewer {
    camera: CameraController,
    car: CarMotion,
    mode: RenderMode,
    composer: SceneComposer,
    registry: DrawableRegistry,
    bindings: KeyBindings,
    pointer_captured: bool,
    viewport: (u32, u32),
}

impl Viewer {
    pub fn new(config: &ViewerConfig, registry: DrawableRegistry) -> Result<Self, ViewerError> {
        Ok(Self {
            camera: CameraController::new(&config.camera),
            car: CarMotion::new(&config.car),
            mode: RenderMode::Filled,
            composer: SceneComposer::new(Projection::new(&config.projection)),
            registry,
            bindings: KeyBindings::from_config(&config.keys)?,
            pointer_captured: false,
            viewport: (config.window.width, config.window.height),
        })
    }

    /// Applies one input event. Returns `true` when camera or render mode
    /// changed and the caller should request an out-of-band redraw.
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::KeyDown(key) => {
                let Some(action) = self.bindings.action_for(key) else {
                    return false;
                };
                self.apply(action);
                true
            }
            InputEvent::KeyUp(key) => {
                if self.bindings.action_for(key) == Some(Action::StopCar) {
                    self.car.resume();
                }
                false
            }
            InputEvent::PointerMotion { dx, dy } => {
                if !self.pointer_captured {
                    return false;
                }
                self.camera.apply_look(dx, dy);
                true
            }
            InputEvent::PointerCapture(captured) => {
                self.pointer_captured = captured;
                false
            }
        }
    }

    fn apply(&mut self, action: Action) {
        debug!("action {action:?}");
        match action {
            Action::MoveForward => self.camera.move_toward(MoveDirection::Forward),
            Action::MoveBack => self.camera.move_toward(MoveDirection::Back),
            Action::StrafeLeft => self.camera.move_toward(MoveDirection::Left),
            Action::StrafeRight => self.camera.move_toward(MoveDirection::Right),
            Action::StopCar => self.car.stop(),
            Action::FilledMode => self.mode = RenderMode::Filled,
            Action::WireframeMode => self.mode = RenderMode::Wireframe,
            Action::ReleasePointer => self.pointer_captured = false,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    pub fn render_mode(&self) -> RenderMode {
        self.mode
    }

    pub fn pointer_captured(&self) -> bool {
        self.pointer_captured
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn car(&self) -> &CarMotion {
        &self.car
    }

    pub fn registry(&self) -> &DrawableRegistry {
        &self.registry
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
    }
}

impl FrameSource for Viewer {
    fn advance(&mut self) {
        if self.car.tick() {
            debug!("car wrapped to x={}", self.car.position().x);
        }
    }

    fn compose(&self) -> Frame {
        let (width, height) = self.viewport;
        self.composer.compose_frame(
            &self.registry,
            &self.camera,
            &self.car.state(),
            self.mode,
            aspect_ratio(width, height),
        )
    }
}

/// One line per headless frame.
pub fn frame_summary(index: u64, frame: &Frame, viewer: &Viewer) -> String {
    let car = viewer.car().position();
    format!(
        "frame {index}: {} commands, {} draw calls, {} mode, car x={:.2}",
        frame.commands.len(),
        frame.draw_calls(),
        frame.mode.label(),
        car.x
    )
}

pub fn print_final_state(viewer: &Viewer) {
    let car = viewer.car();
    let camera = viewer.camera();
    println!("Final state:");
    println!(
        " - car pos=({:.2}, {:.2}, {:.2}) {}",
        car.position().x,
        car.position().y,
        car.position().z,
        match car.phase() {
            CarPhase::Moving => "moving",
            CarPhase::Stopped => "stopped",
        }
    );
    println!(
        " - camera pos=({:.2}, {:.2}, {:.2}) yaw={:.1} pitch={:.1}",
        camera.position().x,
        camera.position().y,
        camera.position().z,
        camera.yaw(),
        camera.pitch()
    );
    println!(
        " - {} drawables, {} mode",
        viewer.registry().len(),
        viewer.render_mode().label()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::DrawableKind;
    use crate::geometry;
    use crate::input::{KeyCode, NamedKey};
    use crate::render::headless::HeadlessGeometry;
    use approx::assert_abs_diff_eq;

    fn viewer() -> Viewer {
        let mut registry = DrawableRegistry::new();
        let mut uploader = HeadlessGeometry::default();
        geometry::register_static_meshes(&mut registry, &mut uploader);
        Viewer::new(&ViewerConfig::default(), registry).unwrap()
    }

    const SPACE: KeyCode = KeyCode::Named(NamedKey::Space);

    #[test]
    fn movement_keys_move_camera_and_request_redraw() {
        let mut viewer = viewer();
        let start = viewer.camera().position();
        assert!(viewer.handle_input(InputEvent::KeyDown(KeyCode::Character('W'))));
        assert_abs_diff_eq!(viewer.camera().position().z, start.z - 0.2, epsilon = 1e-5);
        assert!(viewer.handle_input(InputEvent::KeyDown(KeyCode::Character('D'))));
        assert_abs_diff_eq!(viewer.camera().position().x, start.x + 0.2, epsilon = 1e-5);
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let mut viewer = viewer();
        let before = viewer.camera().clone();
        assert!(!viewer.handle_input(InputEvent::KeyDown(KeyCode::Character('Q'))));
        assert_eq!(viewer.camera(), &before);
    }

    #[test]
    fn holding_stop_key_freezes_car() {
        let mut viewer = viewer();
        viewer.handle_input(InputEvent::KeyDown(SPACE));
        assert_eq!(viewer.car().phase(), CarPhase::Stopped);
        let frozen = viewer.car().position();
        viewer.advance();
        viewer.advance();
        assert_eq!(viewer.car().position(), frozen);

        assert!(!viewer.handle_input(InputEvent::KeyUp(SPACE)));
        assert_eq!(viewer.car().phase(), CarPhase::Moving);
        viewer.advance();
        assert!(viewer.car().position().x > frozen.x);
    }

    #[test]
    fn mode_keys_switch_render_mode() {
        let mut viewer = viewer();
        viewer.handle_input(InputEvent::KeyDown(KeyCode::Digit(2)));
        assert_eq!(viewer.render_mode(), RenderMode::Wireframe);
        assert_eq!(viewer.compose().mode, RenderMode::Wireframe);
        viewer.handle_input(InputEvent::KeyDown(KeyCode::Digit(1)));
        assert_eq!(viewer.render_mode(), RenderMode::Filled);
    }

    #[test]
    fn pointer_motion_requires_capture() {
        let mut viewer = viewer();
        assert!(!viewer.handle_input(InputEvent::PointerMotion { dx: 50.0, dy: 0.0 }));
        assert_abs_diff_eq!(viewer.camera().yaw(), -90.0);

        viewer.handle_input(InputEvent::PointerCapture(true));
        assert!(viewer.handle_input(InputEvent::PointerMotion { dx: 50.0, dy: 0.0 }));
        assert_abs_diff_eq!(viewer.camera().yaw(), -85.0, epsilon = 1e-4);

        viewer.handle_input(InputEvent::KeyDown(KeyCode::Named(NamedKey::Escape)));
        assert!(!viewer.pointer_captured());
        assert!(!viewer.handle_input(InputEvent::PointerMotion { dx: 50.0, dy: 0.0 }));
    }

    #[test]
    fn compose_uses_current_viewport() {
        let mut viewer = viewer();
        viewer.set_viewport(800, 800);
        let square = viewer.compose();
        viewer.set_viewport(1600, 800);
        let wide = viewer.compose();
        assert_abs_diff_eq!(square.projection.x_axis.x, wide.projection.x_axis.x * 2.0, epsilon = 1e-5);
        assert_eq!(square.count(DrawableKind::Car), 1);
    }

    #[test]
    fn exposes_configured_bindings() {
        let mut config = ViewerConfig::default();
        config.keys.forward = "ArrowUp".into();
        let viewer = Viewer::new(&config, DrawableRegistry::new()).unwrap();
        assert_eq!(viewer.bindings().bound_key("ArrowUp"), Some(KeyCode::Named(NamedKey::Up)));
        assert_eq!(viewer.bindings().bound_key("w"), None);
    }

    #[test]
    fn rejects_unknown_key_names() {
        let mut config = ViewerConfig::default();
        config.keys.forward = "NotAKey".into();
        assert!(matches!(
            Viewer::new(&config, DrawableRegistry::new()),
            Err(ViewerError::Config(_))
        ));
    }

    #[test]
    fn summary_line_mentions_counts() {
        let mut viewer = viewer();
        viewer.advance();
        let frame = viewer.compose();
        let line = frame_summary(1, &frame, &viewer);
        assert!(line.starts_with("frame 1: 16 commands"));
        assert!(line.contains("car x=-49.90"));
    }
}
