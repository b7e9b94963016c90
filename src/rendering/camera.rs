use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Vector3, Vector4};

use super::ray::Ray;

/// Perspective camera looking at the map plane.
///
/// Matrices are rebuilt on every change so the per-frame LOD pass can take
/// the camera by shared reference.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Eye position in world coordinates
    pub position: Point3<f64>,
    /// Point the camera looks at
    pub target: Point3<f64>,
    pub up: Vector3<f64>,
    /// Vertical field of view in radians
    pub fov_y: f64,
    /// Viewport width / height
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    /// View matrix
    view_matrix: Matrix4<f64>,
    /// Projection matrix
    projection_matrix: Matrix4<f64>,
    /// Combined view-projection matrix
    view_projection_matrix: Matrix4<f64>,
    inverse_view_projection: Matrix4<f64>,
}

impl Camera {
    /// Create a new camera. `fov_y_degrees` is the vertical field of view.
    pub fn new(position: Point3<f64>, target: Point3<f64>, fov_y_degrees: f64, aspect: f64) -> Self {
        let mut camera = Self {
            position,
            target,
            up: Vector3::y(),
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near: 1.0,
            far: 1.0e9,
            view_matrix: Matrix4::identity(),
            projection_matrix: Matrix4::identity(),
            view_projection_matrix: Matrix4::identity(),
            inverse_view_projection: Matrix4::identity(),
        };

        camera.update_matrices();
        camera
    }

    /// Update camera position
    pub fn set_position(&mut self, position: Point3<f64>) {
        self.position = position;
        self.update_matrices();
    }

    /// Aim at a new target
    pub fn look_at(&mut self, target: Point3<f64>) {
        self.target = target;
        self.update_matrices();
    }

    /// Update viewport size
    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        if height > 0.0 {
            self.aspect = width / height;
            self.update_matrices();
        }
    }

    pub fn set_clip_planes(&mut self, near: f64, far: f64) {
        self.near = near;
        self.far = far;
        self.update_matrices();
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> &Matrix4<f64> {
        &self.view_matrix
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> &Matrix4<f64> {
        &self.projection_matrix
    }

    /// Get the current view-projection matrix
    pub fn view_projection_matrix(&self) -> &Matrix4<f64> {
        &self.view_projection_matrix
    }

    /// Ray from the eye through a point given in normalized device
    /// coordinates (`[-1, 1]` on both axes, `+y` up).
    pub fn ray_from_ndc(&self, x: f64, y: f64) -> Option<Ray> {
        let clip = Vector4::new(x, y, 0.5, 1.0);
        let world = self.inverse_view_projection * clip;
        if world.w.abs() < f64::EPSILON {
            return None;
        }
        let through = Point3::new(world.x / world.w, world.y / world.w, world.z / world.w);
        Ray::new(self.position, through - self.position)
    }

    /// Convert world coordinates to normalized device coordinates; `None`
    /// for points behind the camera.
    pub fn world_to_ndc(&self, world_pos: &Point3<f64>) -> Option<Point3<f64>> {
        let clip = self.view_projection_matrix * world_pos.to_homogeneous();
        if clip.w <= 0.0 {
            return None;
        }
        Some(Point3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w))
    }

    /// Distance from the eye to `point`.
    pub fn distance_to(&self, point: &Point3<f64>) -> f64 {
        nalgebra::distance(&self.position, point)
    }

    /// Update internal matrices
    fn update_matrices(&mut self) {
        let view = Isometry3::look_at_rh(&self.position, &self.target, &self.up);
        self.view_matrix = view.to_homogeneous();
        self.projection_matrix =
            Perspective3::new(self.aspect, self.fov_y, self.near, self.far).to_homogeneous();
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        // Fallback if matrix is not invertible
        self.inverse_view_projection = self
            .view_projection_matrix
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overhead() -> Camera {
        // Looking straight down needs an up vector off the view axis.
        let mut camera = Camera::new(Point3::new(0.0, 100.0, 0.0), Point3::origin(), 60.0, 1.0);
        camera.up = -Vector3::z();
        camera.look_at(Point3::origin());
        camera
    }

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = overhead();
        let ray = camera.ray_from_ndc(0.0, 0.0).unwrap();
        assert!((ray.direction.y + 1.0).abs() < 1e-9);
        let t = ray.intersect_plane(0.0).unwrap();
        assert!((t - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_corner_ray_spreads_with_fov() {
        let camera = overhead();
        let ray = camera.ray_from_ndc(0.0, 1.0).unwrap();
        let hit = ray.at(ray.intersect_plane(0.0).unwrap());
        // tan(30°) * 100 towards the top of the screen, which is -z here
        assert!((hit.z + 100.0 * 30f64.to_radians().tan()).abs() < 1e-6);
    }

    #[test]
    fn test_world_to_ndc_round_trip() {
        let camera = overhead();
        let ndc = camera.world_to_ndc(&Point3::new(10.0, 0.0, -20.0)).unwrap();
        let ray = camera.ray_from_ndc(ndc.x, ndc.y).unwrap();
        let hit = ray.at(ray.intersect_plane(0.0).unwrap());
        assert!((hit.x - 10.0).abs() < 1e-6);
        assert!((hit.z + 20.0).abs() < 1e-6);
        assert!(camera.world_to_ndc(&Point3::new(0.0, 200.0, 0.0)).is_none());
    }
}
