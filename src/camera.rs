use glam::{Mat4, Vec3};

use crate::config::{CameraConfig, ProjectionConfig};

/// Horizontal movement requested by the navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Back,
    Left,
    Right,
}

/// Ground-plane axis a move is applied along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveAxis {
    /// The look direction flattened onto XZ.
    Longitudinal,
    /// Perpendicular to the flattened look direction.
    Lateral,
}

impl MoveDirection {
    pub fn axis(self) -> MoveAxis {
        match self {
            Self::Forward | Self::Back => MoveAxis::Longitudinal,
            Self::Left | Self::Right => MoveAxis::Lateral,
        }
    }

    pub fn sign(self) -> f32 {
        match self {
            Self::Forward | Self::Right => 1.0,
            Self::Back | Self::Left => -1.0,
        }
    }
}

/// First-person camera driven by pointer deltas and movement keys.
///
/// Angles are kept in degrees. `front` is recomputed whenever yaw or pitch
/// change and is always unit length; pitch never leaves
/// `[-pitch_limit, pitch_limit]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraController {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    front: Vec3,
    up: Vec3,
    move_speed: f32,
    sensitivity: f32,
    pitch_limit: f32,
}

impl CameraController {
    pub fn new(config: &CameraConfig) -> Self {
        let pitch_limit = config.pitch_limit.abs();
        let mut camera = Self {
            position: config.position,
            yaw: config.yaw,
            pitch: config.pitch.clamp(-pitch_limit, pitch_limit),
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            move_speed: config.move_speed,
            sensitivity: config.sensitivity,
            pitch_limit,
        };
        camera.update_vectors();
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    /// Turns raw pointer motion into yaw/pitch and refreshes `front`.
    ///
    /// Non-finite deltas are dropped. Pitch is clamped on every call, even
    /// when the input pushes further outside the range.
    pub fn apply_look(&mut self, delta_x: f32, delta_y: f32) {
        if !delta_x.is_finite() || !delta_y.is_finite() {
            return;
        }
        self.yaw += delta_x * self.sensitivity;
        self.pitch -= delta_y * self.sensitivity;
        self.pitch = self.pitch.clamp(-self.pitch_limit, self.pitch_limit);
        self.update_vectors();
    }

    pub fn move_toward(&mut self, direction: MoveDirection) {
        self.move_along(direction.axis(), direction.sign());
    }

    /// Moves `sign * move_speed` along a ground-plane axis. No collision.
    pub fn move_along(&mut self, axis: MoveAxis, sign: f32) {
        let flat_front = Vec3::new(self.front.x, 0.0, self.front.z);
        let direction = match axis {
            MoveAxis::Longitudinal => flat_front,
            MoveAxis::Lateral => flat_front.cross(self.up).normalize_or_zero(),
        };
        self.position += direction * (sign * self.move_speed);
    }

    /// World-to-camera transform looking from `position` along `front`.
    pub fn view_transform(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        let front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());
        self.front = front.normalize();
    }
}

/// Perspective parameters; the aspect ratio is supplied per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    fov_y: f32,
    near: f32,
    far: f32,
}

impl Projection {
    pub fn new(config: &ProjectionConfig) -> Self {
        Self {
            fov_y: config.fov_y,
            near: config.near,
            far: config.far,
        }
    }

    pub fn matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), aspect.max(0.01), self.near, self.far)
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(&ProjectionConfig::default())
    }
}

/// Aspect ratio of a viewport, `1.0` for a degenerate height.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn camera() -> CameraController {
        CameraController::new(&CameraConfig::default())
    }

    #[test]
    fn default_orientation_looks_down_negative_z() {
        let camera = camera();
        assert_abs_diff_eq!(camera.front().x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(camera.front().y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(camera.front().z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn pitch_stays_clamped_for_any_sequence() {
        let mut camera = camera();
        let deltas = [
            (0.0, -1000.0),
            (3.0, -50.0),
            (0.0, 5000.0),
            (-12.0, 2.5),
            (400.0, -7.0),
            (0.0, -900.0),
        ];
        for (dx, dy) in deltas {
            camera.apply_look(dx, dy);
            assert!(camera.pitch() >= -45.0 && camera.pitch() <= 45.0);
            assert_abs_diff_eq!(camera.front().length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn clamp_applies_even_when_already_at_limit() {
        let mut camera = camera();
        camera.apply_look(0.0, -1000.0);
        assert_eq!(camera.pitch(), 45.0);
        camera.apply_look(0.0, -10.0);
        assert_eq!(camera.pitch(), 45.0);
        camera.apply_look(0.0, 10.0);
        assert_abs_diff_eq!(camera.pitch(), 44.0, epsilon = 1e-4);
    }

    #[test]
    fn yaw_is_unbounded() {
        let mut camera = camera();
        camera.apply_look(7200.0, 0.0);
        assert_abs_diff_eq!(camera.yaw(), 630.0, epsilon = 1e-3);
        assert_abs_diff_eq!(camera.front().z, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn non_finite_deltas_are_ignored() {
        let mut camera = camera();
        camera.apply_look(f32::NAN, 1.0);
        camera.apply_look(1.0, f32::INFINITY);
        assert_eq!(camera, CameraController::new(&CameraConfig::default()));
    }

    #[test]
    fn forward_moves_on_ground_plane_even_when_looking_up() {
        let mut camera = camera();
        camera.apply_look(0.0, -300.0);
        let start = camera.position();
        camera.move_toward(MoveDirection::Forward);
        assert_eq!(camera.position().y, start.y);
        assert!(camera.position().z < start.z);
        camera.move_toward(MoveDirection::Back);
        assert_abs_diff_eq!(camera.position().z, start.z, epsilon = 1e-6);
    }

    #[test]
    fn strafe_uses_normalized_right_vector() {
        let mut camera = camera();
        camera.apply_look(0.0, 200.0);
        let start = camera.position();
        camera.move_toward(MoveDirection::Right);
        assert_abs_diff_eq!(camera.position().x - start.x, 0.2, epsilon = 1e-5);
        camera.move_toward(MoveDirection::Left);
        camera.move_toward(MoveDirection::Left);
        assert_abs_diff_eq!(camera.position().x - start.x, -0.2, epsilon = 1e-5);
    }

    #[test]
    fn view_transform_maps_target_onto_negative_z_axis() {
        let camera = camera();
        let view = camera.view_transform();
        let target = view.transform_point3(camera.position() + camera.front() * 3.0);
        assert_abs_diff_eq!(target.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(target.y, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(target.z, -3.0, epsilon = 1e-5);
    }

    #[test]
    fn aspect_ratio_guards_zero_height() {
        assert_eq!(aspect_ratio(1280, 0), 1.0);
        assert_abs_diff_eq!(aspect_ratio(1280, 720), 16.0 / 9.0);
        let projection = Projection::default();
        assert!(!projection.matrix(0.0).col(0).x.is_nan());
    }
}
