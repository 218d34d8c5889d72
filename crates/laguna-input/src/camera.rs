//! Viewing camera used for picking and screen-space lookups.

use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4Swizzles};

use crate::picking::Ray;

/// Projection type for the camera.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
    },
    /// Top-down map views.
    Orthographic {
        /// Half-height of the view volume in scene units.
        half_height: f32,
    },
}

/// A camera over the scene plus the viewport it renders into.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    pub projection: Projection,
    /// Near clip plane distance (always positive).
    pub near: f32,
    /// Far clip plane distance (always positive, > near).
    pub far: f32,
    /// Viewport size in pixels.
    pub viewport: Vec2,
}

impl Camera {
    /// Camera at `position` facing `target`. Looking straight down keeps
    /// north (-Z) at the top of the screen.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let forward = (target - position).try_normalize().unwrap_or(Vec3::NEG_Z);
        let up_hint = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        let right = forward.cross(up_hint).normalize();
        let up = right.cross(forward);
        Self {
            position,
            rotation: Quat::from_mat3(&Mat3::from_cols(right, up, -forward)),
            ..Self::default()
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.viewport.y > 0.0 {
            self.viewport.x / self.viewport.y
        } else {
            1.0
        }
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Vec2::new(width, height);
    }

    pub fn view_matrix(&self) -> Mat4 {
        (Mat4::from_translation(self.position) * Mat4::from_quat(self.rotation)).inverse()
    }

    /// Projection with reverse-Z: near maps to depth 1, far to 0.
    pub fn projection_matrix(&self) -> Mat4 {
        let aspect = self.aspect_ratio();
        match self.projection {
            Projection::Perspective { fov_y } => Mat4::perspective_rh(fov_y, aspect, self.far, self.near),
            Projection::Orthographic { half_height } => {
                let half_width = half_height * aspect;
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.far,
                    self.near,
                )
            }
        }
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// The forward direction vector (-Z in camera space).
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Pixel coordinates (origin top-left) to normalized device coordinates.
    fn to_ndc(&self, screen: Vec2) -> Vec2 {
        let size = self.viewport.max(Vec2::ONE);
        Vec2::new(2.0 * screen.x / size.x - 1.0, 1.0 - 2.0 * screen.y / size.y)
    }

    /// Ray through a pixel.
    pub fn screen_ray(&self, screen: Vec2) -> Ray {
        let ndc = self.to_ndc(screen);
        match self.projection {
            Projection::Perspective { fov_y } => {
                let half = (fov_y * 0.5).tan();
                let local = Vec3::new(ndc.x * half * self.aspect_ratio(), ndc.y * half, -1.0);
                Ray::new(self.position, self.rotation * local)
            }
            Projection::Orthographic { half_height } => {
                let offset = self.right() * ndc.x * half_height * self.aspect_ratio()
                    + self.up() * ndc.y * half_height;
                Ray::new(self.position + offset, self.forward())
            }
        }
    }

    /// Pixel position of a scene point, or `None` when it is behind the
    /// camera or outside the depth range.
    pub fn world_to_screen(&self, point: Vec3) -> Option<Vec2> {
        let clip = self.view_projection_matrix() * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        if !(0.0..=1.0).contains(&ndc.z) {
            return None;
        }
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
        ))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: std::f32::consts::FRAC_PI_4,
            },
            near: 0.1,
            far: 10000.0,
            viewport: Vec2::new(1280.0, 720.0),
        }
    }
}
