// src/scene.rs - Camera projection and the overlay mesh
use std::collections::HashSet;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracking::OverlayTransform;

/// Screen-to-world conversion the engine needs from the render camera.
pub trait Unproject {
    /// Maps a normalized-device-coordinate point (each axis -1..1) to world space.
    fn unproject(&self, ndc: &Point3<f64>) -> Point3<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub fov_degrees: f64,
    pub near: f64,
    pub far: f64,
    pub camera_distance: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            camera_distance: 5.0,
        }
    }
}

// Maps window coordinates straight onto NDC, so glm's viewport math is a no-op on x/y
const NDC_VIEWPORT: [f64; 4] = [-1.0, -1.0, 2.0, 2.0];

#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub fov_degrees: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    pub position: Vector3<f64>,
}

impl PerspectiveCamera {
    pub fn new(config: &SceneConfig, aspect: f64) -> Self {
        Self {
            fov_degrees: config.fov_degrees,
            aspect,
            near: config.near,
            far: config.far,
            position: Vector3::new(0.0, 0.0, config.camera_distance),
        }
    }

    /// Keeps the projection in step with the viewport after a resize.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = (width / height) as f64;
        }
    }

    fn view_matrix(&self) -> glm::TMat4<f64> {
        let target = self.position - Vector3::z();
        glm::look_at(&self.position, &target, &Vector3::y())
    }

    fn projection_matrix(&self) -> glm::TMat4<f64> {
        glm::perspective(self.aspect, self.fov_degrees.to_radians(), self.near, self.far)
    }

    fn viewport() -> glm::TVec4<f64> {
        glm::TVec4::from(NDC_VIEWPORT)
    }

    /// World space to NDC, the inverse of [`Unproject::unproject`].
    pub fn project(&self, world: &Point3<f64>) -> Point3<f64> {
        let win = glm::project(
            &world.coords,
            &self.view_matrix(),
            &self.projection_matrix(),
            Self::viewport(),
        );
        Point3::new(win.x, win.y, win.z * 2.0 - 1.0)
    }
}

impl Unproject for PerspectiveCamera {
    fn unproject(&self, ndc: &Point3<f64>) -> Point3<f64> {
        // glm expects window depth in 0..1
        let win = glm::vec3(ndc.x, ndc.y, (ndc.z + 1.0) * 0.5);
        let world = glm::unproject(
            &win,
            &self.view_matrix(),
            &self.projection_matrix(),
            Self::viewport(),
        );
        Point3::from(world)
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read mesh asset: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("mesh asset has no vertices")]
    Empty,
}

/// Static overlay geometry: vertex positions plus the edges of every face,
/// enough to draw a wireframe.
#[derive(Debug, Clone, Default)]
pub struct MeshAsset {
    pub vertices: Vec<Point3<f64>>,
    pub edges: Vec<(usize, usize)>,
}

impl MeshAsset {
    /// Loads a Wavefront OBJ file and recentres it so its bounding box sits on the origin.
    pub fn load_obj(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        let mut mesh = Self::parse_obj(&source)?;
        mesh.center_on_origin();
        Ok(mesh)
    }

    pub fn parse_obj(source: &str) -> Result<Self, AssetError> {
        let mut vertices = Vec::new();
        let mut edges = HashSet::new();

        for (i, raw) in source.lines().enumerate() {
            let line_no = i + 1;
            let mut parts = raw.split_whitespace();

            match parts.next() {
                Some("v") => {
                    let coords: Vec<f64> = parts
                        .take(3)
                        .map(|p| p.parse::<f64>())
                        .collect::<Result<_, _>>()
                        .map_err(|e: std::num::ParseFloatError| AssetError::Parse {
                            line: line_no,
                            message: format!("bad vertex coordinate: {}", e),
                        })?;
                    if coords.len() != 3 {
                        return Err(AssetError::Parse {
                            line: line_no,
                            message: "vertex needs three coordinates".to_string(),
                        });
                    }
                    vertices.push(Point3::new(coords[0], coords[1], coords[2]));
                }
                Some("f") => {
                    let face = parts
                        .map(|p| resolve_index(p, vertices.len(), line_no))
                        .collect::<Result<Vec<_>, _>>()?;
                    for (k, &a) in face.iter().enumerate() {
                        let b = face[(k + 1) % face.len()];
                        if a != b {
                            edges.insert((a.min(b), a.max(b)));
                        }
                    }
                }
                // Normals, texture coordinates, groups and materials are not needed for the overlay
                _ => {}
            }
        }

        if vertices.is_empty() {
            return Err(AssetError::Empty);
        }

        let mut edges: Vec<_> = edges.into_iter().collect();
        edges.sort_unstable();

        Ok(Self { vertices, edges })
    }

    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (min.inf(v), max.sup(v))
        }))
    }

    pub fn center_on_origin(&mut self) {
        if let Some((min, max)) = self.bounding_box() {
            let center = nalgebra::center(&min, &max);
            for v in &mut self.vertices {
                *v -= center.coords;
            }
        }
    }
}

// OBJ indices are 1-based, negative values count back from the latest vertex
fn resolve_index(token: &str, vertex_count: usize, line: usize) -> Result<usize, AssetError> {
    let bad = |message: String| AssetError::Parse { line, message };
    let index_str = token.split('/').next().unwrap_or(token);
    let index: i64 = index_str
        .parse()
        .map_err(|e| bad(format!("bad face index '{}': {}", token, e)))?;

    let resolved = if index > 0 {
        index - 1
    } else {
        vertex_count as i64 + index
    };

    if index == 0 || resolved < 0 || resolved >= vertex_count as i64 {
        return Err(bad(format!("face index {} out of range", index)));
    }
    Ok(resolved as usize)
}

/// The watch model placed in the scene.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub mesh: MeshAsset,
    pub transform: OverlayTransform,
}

impl Overlay {
    pub fn new(mesh: MeshAsset, transform: OverlayTransform) -> Self {
        Self { mesh, transform }
    }

    /// Mesh vertices after scale, rotation and translation.
    pub fn world_vertices(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        let t = &self.transform;
        self.mesh
            .vertices
            .iter()
            .map(move |v| t.position + t.rotation * (v.coords * t.scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    const CUBE: &str = "\
# unit cube offset from the origin
o cube
v 1.0 1.0 1.0
v 3.0 1.0 1.0
v 3.0 3.0 1.0
v 1.0 3.0 1.0
v 1.0 1.0 5.0
v 3.0 1.0 5.0
v 3.0 3.0 5.0
v 1.0 3.0 5.0
vn 0.0 0.0 1.0
f 1//1 2//1 3//1 4//1
f 5 6 7 8
f 1 2 6 5
f -1 -2 -6 -5
";

    #[test]
    fn parses_vertices_and_face_edges() {
        let mesh = MeshAsset::parse_obj(CUBE).unwrap();
        assert_eq!(mesh.vertices.len(), 8);
        assert!(mesh.edges.contains(&(0, 1)));
        assert!(mesh.edges.contains(&(0, 3)));
        assert!(mesh.edges.contains(&(1, 5)));
        // relative indices on the last face resolve to 8, 7, 3, 4
        assert!(mesh.edges.contains(&(6, 7)));
        assert!(mesh.edges.contains(&(2, 6)));
    }

    #[test]
    fn centering_moves_bounding_box_to_origin() {
        let mut mesh = MeshAsset::parse_obj(CUBE).unwrap();
        mesh.center_on_origin();

        let (min, max) = mesh.bounding_box().unwrap();
        assert_eq!(min, Point3::new(-1.0, -1.0, -2.0));
        assert_eq!(max, Point3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn rejects_out_of_range_faces_and_empty_meshes() {
        assert!(matches!(
            MeshAsset::parse_obj("v 0 0 0\nf 1 2 3\n"),
            Err(AssetError::Parse { line: 2, .. })
        ));
        assert!(matches!(MeshAsset::parse_obj("# nothing\n"), Err(AssetError::Empty)));
        assert!(matches!(
            MeshAsset::parse_obj("v 0 zero 0\n"),
            Err(AssetError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn bundled_watch_model_loads_centred() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/models/watch.obj");
        let mesh = MeshAsset::load_obj(path).unwrap();
        assert_eq!(mesh.vertices.len(), 41);

        let (min, max) = mesh.bounding_box().unwrap();
        assert!((min.coords + max.coords).norm() < 1e-9);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = MeshAsset::load_obj("/definitely/not/here.obj").unwrap_err();
        assert!(matches!(err, AssetError::Io(_)));
    }

    #[test]
    fn unproject_inverts_project() {
        let camera = PerspectiveCamera::new(&SceneConfig::default(), 16.0 / 9.0);
        for ndc in [
            Point3::new(0.0, 0.0, 0.5),
            Point3::new(-0.8, 0.3, 0.5),
            Point3::new(0.25, -0.9, 0.9),
        ] {
            let world = camera.unproject(&ndc);
            let back = camera.project(&world);
            assert!((back - ndc).norm() < 1e-6, "{:?} -> {:?}", ndc, back);
        }
    }

    #[test]
    fn screen_centre_unprojects_onto_view_axis_in_front_of_camera() {
        let camera = PerspectiveCamera::new(&SceneConfig::default(), 1.0);
        let p = camera.unproject(&Point3::new(0.0, 0.0, 0.5));
        assert!(p.x.abs() < 1e-9);
        assert!(p.y.abs() < 1e-9);
        assert!(p.z < 5.0 && p.z > 0.0, "z = {}", p.z);
    }

    #[test]
    fn overlay_applies_scale_rotation_then_translation() {
        let mesh = MeshAsset {
            vertices: vec![Point3::new(1.0, 0.0, 0.0)],
            edges: vec![],
        };
        let transform = OverlayTransform {
            position: Point3::new(0.0, 0.0, 1.0),
            rotation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
            scale: 2.0,
        };
        let overlay = Overlay::new(mesh, transform);
        let v: Vec<_> = overlay.world_vertices().collect();
        assert!((v[0] - Point3::new(0.0, 2.0, 1.0)).norm() < 1e-9);
    }
}
