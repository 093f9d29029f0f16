//! Collision geometry derived from scene meshes.
//!
//! Produces engine-agnostic [`ColliderDescriptor`]s. Rails degrade from an
//! exact trimesh to a sampled convex hull to a bounding box; terrain prefers a
//! heightfield and otherwise falls back to a flat plane.
//!
//! Vertices are transformed the same way the renderer places them: scale and
//! rotation are baked into the collider vertices so that the collider pose is a
//! plain translation.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::{
    collision::{CollisionGroups, CollisionType},
    error::{Error, Result},
    params::VehicleParams,
};

/// Axis-aligned bounds in an object's local space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Bounds of the finite points in `points`, or `None` if there are none.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let mut finite = points.iter().copied().filter(|p| p.is_finite());
        let first = finite.next()?;
        let (min, max) = finite.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    /// Center of the box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half of the box size along each axis.
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

/// World placement of a scene object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectTransform {
    /// World translation.
    pub translation: Vec3,
    /// World rotation.
    pub rotation: Quat,
    /// World scale.
    pub scale: Vec3,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl ObjectTransform {
    /// A transform with only a translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Apply scale and rotation to a local point, leaving translation out.
    pub fn orient(&self, local: Vec3) -> Vec3 {
        self.rotation * (self.scale * local)
    }
}

/// Mesh data for one scene object, as handed over by the track loader.
#[derive(Clone, Debug, Default)]
pub struct MeshSource {
    /// Object name.
    pub name: String,
    /// Name of the parent object, if any.
    pub parent_name: Option<String>,
    /// World transform; `None` if the loader could not resolve one.
    pub transform: Option<ObjectTransform>,
    /// Local-space vertex positions.
    pub vertices: Vec<Vec3>,
    /// Triangle list indices, if the mesh is indexed.
    pub indices: Option<Vec<u32>>,
    /// Local-space bounds, if the loader computed them.
    pub bounds: Option<Aabb>,
}

impl MeshSource {
    /// Create a mesh source with a name and transform and no geometry.
    pub fn new(name: impl Into<String>, transform: ObjectTransform) -> Self {
        Self {
            name: name.into(),
            transform: Some(transform),
            ..Default::default()
        }
    }

    /// Attach geometry.
    #[must_use]
    pub fn with_geometry(mut self, vertices: Vec<Vec3>, indices: Option<Vec<u32>>) -> Self {
        self.vertices = vertices;
        self.indices = indices;
        self
    }

    /// Attach precomputed bounds.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Aabb) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Attach a parent name.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_name = Some(parent.into());
        self
    }

    fn require_transform(&self) -> Result<ObjectTransform> {
        self.transform.ok_or_else(|| Error::MissingTransform {
            object: self.name.clone(),
        })
    }

    fn local_bounds(&self) -> Option<Aabb> {
        self.bounds.or_else(|| Aabb::from_points(&self.vertices))
    }

    /// Triangle list if the index buffer is usable as-is.
    fn triangles(&self) -> Option<Vec<[u32; 3]>> {
        let indices = self.indices.as_ref()?;
        if indices.is_empty() || indices.len() % 3 != 0 {
            return None;
        }
        let count = u32::try_from(self.vertices.len()).ok()?;
        if indices.iter().any(|&i| i >= count) {
            return None;
        }
        if self.vertices.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(
            indices
                .chunks_exact(3)
                .map(|tri| [tri[0], tri[1], tri[2]])
                .collect(),
        )
    }
}

/// Gridded elevation data for terrain.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightfieldSource {
    /// Number of rows (along Z).
    pub rows: usize,
    /// Number of columns (along X).
    pub cols: usize,
    /// Row-major heights, `rows * cols` long.
    pub heights: Vec<f32>,
    /// Total extent along X and Z, in meters.
    pub size: glam::Vec2,
}

impl HeightfieldSource {
    /// Check dimensions and values.
    pub fn validate(&self) -> Result<()> {
        if self.rows < 2 || self.cols < 2 {
            return Err(Error::InvalidHeightfield {
                detail: format!("need at least 2x2 samples, got {}x{}", self.rows, self.cols),
            });
        }
        if self.rows * self.cols != self.heights.len() {
            return Err(Error::InvalidHeightfield {
                detail: format!(
                    "{}x{} grid does not match {} samples",
                    self.rows,
                    self.cols,
                    self.heights.len()
                ),
            });
        }
        if self.heights.iter().any(|h| !h.is_finite()) {
            return Err(Error::InvalidHeightfield {
                detail: "non-finite height sample".into(),
            });
        }
        if !self.size.is_finite() || self.size.min_element() <= 0.0 {
            return Err(Error::InvalidHeightfield {
                detail: format!("invalid extent {}", self.size),
            });
        }
        Ok(())
    }

    /// One `Vec` of X samples per Z row.
    fn to_rows(&self) -> Vec<Vec<f32>> {
        self.heights
            .chunks_exact(self.cols)
            .map(<[f32]>::to_vec)
            .collect()
    }
}

/// Friction and restitution for a collider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMaterial {
    /// Friction coefficient.
    pub friction: f32,
    /// Restitution coefficient.
    pub restitution: f32,
}

impl SurfaceMaterial {
    /// Create a material.
    pub const fn new(friction: f32, restitution: f32) -> Self {
        Self {
            friction,
            restitution,
        }
    }
}

/// Tunable constants used by the builder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderPresets {
    /// Material for rails.
    pub rail: SurfaceMaterial,
    /// Material for terrain.
    pub terrain: SurfaceMaterial,
    /// Material for the chassis.
    pub chassis: SurfaceMaterial,
    /// Material for everything else.
    pub object: SurfaceMaterial,
    /// Half extents of the flat terrain fallback plane.
    pub terrain_plane_half_extents: Vec3,
    /// Height the flat terrain plane is pinned to.
    pub reference_height: f32,
    /// Maximum points handed to the convex hull.
    pub hull_max_samples: usize,
    /// Floor applied to every half extent of a fallback box.
    pub min_half_extent: f32,
    /// Box used for rails that carry neither vertices nor bounds.
    pub rail_fallback_half_extents: Vec3,
}

impl Default for ColliderPresets {
    fn default() -> Self {
        Self {
            rail: SurfaceMaterial::new(0.1, 0.1),
            terrain: SurfaceMaterial::new(0.8, 0.2),
            chassis: SurfaceMaterial::new(0.5, 0.2),
            object: SurfaceMaterial::new(0.5, 0.2),
            terrain_plane_half_extents: Vec3::new(500.0, 0.05, 500.0),
            reference_height: 0.0,
            hull_max_samples: 100,
            min_half_extent: 0.1,
            rail_fallback_half_extents: Vec3::new(0.15, 0.75, 0.2),
        }
    }
}

/// Geometry of a collider.
#[derive(Clone, Debug, PartialEq)]
pub enum ColliderShape {
    /// Box with the given half extents.
    Cuboid {
        /// Half extents.
        half_extents: Vec3,
    },
    /// Convex hull of a point cloud.
    ConvexHull {
        /// Hull input points.
        points: Vec<Vec3>,
    },
    /// Exact triangle mesh.
    Trimesh {
        /// Vertex positions.
        vertices: Vec<Vec3>,
        /// Triangle indices.
        triangles: Vec<[u32; 3]>,
    },
    /// Height grid centered on the origin, indexed `[row][col]`.
    ///
    /// Rows run along Z and columns along X: `heights[0][0]` sits at
    /// `(-scale.x / 2, -scale.z / 2)`, the last column at `+scale.x / 2`.
    Heightfield {
        /// Height samples, one `Vec` per row, all rows the same length.
        heights: Vec<Vec<f32>>,
        /// Extent along X and Z, vertical scale in Y.
        scale: Vec3,
    },
}

/// Which tier of the fallback chain produced a shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// [`ColliderShape::Cuboid`].
    Cuboid,
    /// [`ColliderShape::ConvexHull`].
    ConvexHull,
    /// [`ColliderShape::Trimesh`].
    Trimesh,
    /// [`ColliderShape::Heightfield`].
    Heightfield,
}

impl ColliderShape {
    /// The shape's kind.
    pub fn kind(&self) -> ShapeKind {
        match self {
            ColliderShape::Cuboid { .. } => ShapeKind::Cuboid,
            ColliderShape::ConvexHull { .. } => ShapeKind::ConvexHull,
            ColliderShape::Trimesh { .. } => ShapeKind::Trimesh,
            ColliderShape::Heightfield { .. } => ShapeKind::Heightfield,
        }
    }

    /// Axis-aligned bounds of the shape in collider space.
    pub fn local_bounds(&self) -> Aabb {
        match self {
            ColliderShape::Cuboid { half_extents } => Aabb {
                min: -*half_extents,
                max: *half_extents,
            },
            ColliderShape::ConvexHull { points } => {
                Aabb::from_points(points).unwrap_or(Aabb {
                    min: Vec3::ZERO,
                    max: Vec3::ZERO,
                })
            }
            ColliderShape::Trimesh { vertices, .. } => {
                Aabb::from_points(vertices).unwrap_or(Aabb {
                    min: Vec3::ZERO,
                    max: Vec3::ZERO,
                })
            }
            ColliderShape::Heightfield { heights, scale } => {
                let (lo, hi) = heights
                    .iter()
                    .flatten()
                    .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)));
                let half = Vec3::new(scale.x, 0.0, scale.z) * 0.5;
                Aabb {
                    min: Vec3::new(-half.x, lo * scale.y, -half.z),
                    max: Vec3::new(half.x, hi * scale.y, half.z),
                }
            }
        }
    }
}

/// Everything the engine needs to create one collider.
#[derive(Clone, Debug, PartialEq)]
pub struct ColliderDescriptor {
    /// Geometry.
    pub shape: ColliderShape,
    /// World translation of the collider.
    pub translation: Vec3,
    /// World rotation of the collider.
    pub rotation: Quat,
    /// Friction and restitution.
    pub material: SurfaceMaterial,
    /// Broadphase groups.
    pub groups: CollisionGroups,
    /// Semantic type.
    pub collision_type: CollisionType,
    /// Mass for dynamic bodies.
    pub mass: Option<f32>,
    /// Sensors report contacts without a physical response.
    pub sensor: bool,
    /// Name of the source object.
    pub source_name: String,
}

impl ColliderDescriptor {
    /// The same descriptor with its shape replaced by its bounding box.
    ///
    /// Engines use this when they cannot build the hull they were handed.
    #[must_use]
    pub fn as_bounding_box(&self, min_half_extent: f32) -> Self {
        let bounds = self.shape.local_bounds();
        Self {
            shape: ColliderShape::Cuboid {
                half_extents: bounds.half_extents().max(Vec3::splat(min_half_extent)),
            },
            translation: self.translation + self.rotation * bounds.center(),
            ..self.clone()
        }
    }
}

/// Derives collider descriptors from scene objects.
#[derive(Clone, Debug, Default)]
pub struct ColliderBuilder {
    /// Constants used for every build.
    pub presets: ColliderPresets,
}

impl ColliderBuilder {
    /// Create a builder with custom presets.
    pub fn new(presets: ColliderPresets) -> Self {
        Self { presets }
    }

    /// Build the collider for an object of the given type.
    pub fn build(&self, source: &MeshSource, ty: CollisionType) -> Result<ColliderDescriptor> {
        match ty {
            CollisionType::Rail => self.rail(source),
            CollisionType::Ground => self.terrain(source, None),
            CollisionType::Checkpoint => self.checkpoint(source),
            CollisionType::Vehicle => {
                self.bounding_box(source, ty, self.presets.chassis, Vec3::splat(0.5))
            }
            CollisionType::Object => {
                self.bounding_box(source, ty, self.presets.object, Vec3::splat(0.5))
            }
        }
    }

    /// Rail collider: trimesh, then sampled convex hull, then bounding box.
    pub fn rail(&self, source: &MeshSource) -> Result<ColliderDescriptor> {
        let transform = source.require_transform()?;

        let shape = if let Some(triangles) = source.triangles() {
            tracing::debug!(object = %source.name, triangles = triangles.len(), "Rail collider: trimesh");
            ColliderShape::Trimesh {
                vertices: source.vertices.iter().map(|&v| transform.orient(v)).collect(),
                triangles,
            }
        } else if let Some(points) = self.sample_hull_points(&source.vertices) {
            tracing::debug!(object = %source.name, points = points.len(), "Rail collider: convex hull");
            ColliderShape::ConvexHull {
                points: points.into_iter().map(|v| transform.orient(v)).collect(),
            }
        } else {
            tracing::warn!(
                object = %source.name,
                vertices = source.vertices.len(),
                "Rail collider: falling back to bounding box"
            );
            return self.bounding_box(
                source,
                CollisionType::Rail,
                self.presets.rail,
                self.presets.rail_fallback_half_extents,
            );
        };

        Ok(self.descriptor(
            source,
            shape,
            transform.translation,
            Quat::IDENTITY,
            CollisionType::Rail,
            self.presets.rail,
        ))
    }

    /// Terrain collider: heightfield when elevation data is valid, else a flat plane.
    pub fn terrain(
        &self,
        source: &MeshSource,
        heightfield: Option<&HeightfieldSource>,
    ) -> Result<ColliderDescriptor> {
        let transform = source.require_transform()?;

        if let Some(field) = heightfield {
            match field.validate() {
                Ok(()) => {
                    tracing::info!(
                        object = %source.name,
                        rows = field.rows,
                        cols = field.cols,
                        "Terrain collider: heightfield"
                    );
                    let shape = ColliderShape::Heightfield {
                        heights: field.to_rows(),
                        scale: Vec3::new(field.size.x, 1.0, field.size.y),
                    };
                    return Ok(self.descriptor(
                        source,
                        shape,
                        transform.translation,
                        Quat::IDENTITY,
                        CollisionType::Ground,
                        self.presets.terrain,
                    ));
                }
                Err(e) => {
                    tracing::warn!(object = %source.name, error = %e, "Ignoring heightfield");
                }
            }
        }

        // Elevation is discarded here; only correct for flat tracks.
        tracing::warn!(
            object = %source.name,
            height = self.presets.reference_height,
            "Terrain collider: flat plane, elevation ignored"
        );
        let translation = Vec3::new(
            transform.translation.x,
            self.presets.reference_height,
            transform.translation.z,
        );
        Ok(self.descriptor(
            source,
            ColliderShape::Cuboid {
                half_extents: self.presets.terrain_plane_half_extents,
            },
            translation,
            Quat::IDENTITY,
            CollisionType::Ground,
            self.presets.terrain,
        ))
    }

    /// Chassis box for a vehicle, carrying its mass.
    pub fn chassis(&self, params: &VehicleParams) -> ColliderDescriptor {
        ColliderDescriptor {
            shape: ColliderShape::Cuboid {
                half_extents: params.chassis_half_extents,
            },
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            material: self.presets.chassis,
            groups: CollisionType::Vehicle.groups(),
            collision_type: CollisionType::Vehicle,
            mass: Some(params.chassis_mass),
            sensor: false,
            source_name: "chassis".into(),
        }
    }

    /// Sensor box covering a checkpoint gate.
    pub fn checkpoint(&self, source: &MeshSource) -> Result<ColliderDescriptor> {
        let mut descriptor = self.bounding_box(
            source,
            CollisionType::Checkpoint,
            self.presets.object,
            Vec3::splat(1.0),
        )?;
        descriptor.sensor = true;
        Ok(descriptor)
    }

    /// Stride-sample up to `hull_max_samples` finite points, or `None` if fewer than 4.
    fn sample_hull_points(&self, vertices: &[Vec3]) -> Option<Vec<Vec3>> {
        let max_samples = self.presets.hull_max_samples.max(4);
        let stride = vertices.len().div_ceil(max_samples).max(1);
        let points: Vec<Vec3> = vertices
            .iter()
            .step_by(stride)
            .copied()
            .filter(|v| v.is_finite())
            .take(max_samples)
            .collect();
        (points.len() >= 4).then_some(points)
    }

    /// Oriented box from the object's local bounds.
    fn bounding_box(
        &self,
        source: &MeshSource,
        ty: CollisionType,
        material: SurfaceMaterial,
        default_half_extents: Vec3,
    ) -> Result<ColliderDescriptor> {
        let transform = source.require_transform()?;
        let (center, half_extents) = match source.local_bounds() {
            Some(bounds) => (bounds.center(), bounds.half_extents()),
            None => (Vec3::ZERO, default_half_extents),
        };
        let half_extents =
            (half_extents * transform.scale.abs()).max(Vec3::splat(self.presets.min_half_extent));
        let translation = transform.translation + transform.orient(center);
        Ok(self.descriptor(
            source,
            ColliderShape::Cuboid { half_extents },
            translation,
            transform.rotation,
            ty,
            material,
        ))
    }

    fn descriptor(
        &self,
        source: &MeshSource,
        shape: ColliderShape,
        translation: Vec3,
        rotation: Quat,
        ty: CollisionType,
        material: SurfaceMaterial,
    ) -> ColliderDescriptor {
        ColliderDescriptor {
            shape,
            translation,
            rotation,
            material,
            groups: ty.groups(),
            collision_type: ty,
            mass: None,
            sensor: false,
            source_name: source.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_vertices() -> Vec<Vec3> {
        let mut vertices = Vec::new();
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for z in [-1.0, 1.0] {
                    vertices.push(Vec3::new(x, y, z));
                }
            }
        }
        vertices
    }

    fn rail(vertices: Vec<Vec3>, indices: Option<Vec<u32>>) -> MeshSource {
        MeshSource::new(
            "rail_01",
            ObjectTransform::from_translation(Vec3::new(5.0, 0.0, 0.0)),
        )
        .with_geometry(vertices, indices)
    }

    #[test]
    fn test_rail_with_valid_indices_is_trimesh() {
        let source = rail(cube_vertices(), Some(vec![0, 1, 2, 2, 1, 3]));
        let descriptor = ColliderBuilder::default().rail(&source).unwrap();
        assert_eq!(descriptor.shape.kind(), ShapeKind::Trimesh);
        assert_eq!(descriptor.material, SurfaceMaterial::new(0.1, 0.1));
        assert_eq!(descriptor.translation, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_rail_without_indices_is_hull() {
        let descriptor = ColliderBuilder::default()
            .rail(&rail(cube_vertices(), None))
            .unwrap();
        assert_eq!(descriptor.shape.kind(), ShapeKind::ConvexHull);
    }

    #[test]
    fn test_rail_with_malformed_indices_is_hull() {
        let builder = ColliderBuilder::default();
        // Not a multiple of three.
        let odd = builder
            .rail(&rail(cube_vertices(), Some(vec![0, 1, 2, 3])))
            .unwrap();
        assert_eq!(odd.shape.kind(), ShapeKind::ConvexHull);
        // Out of range.
        let out_of_range = builder
            .rail(&rail(cube_vertices(), Some(vec![0, 1, 42])))
            .unwrap();
        assert_eq!(out_of_range.shape.kind(), ShapeKind::ConvexHull);
        // Empty.
        let empty = builder.rail(&rail(cube_vertices(), Some(vec![]))).unwrap();
        assert_eq!(empty.shape.kind(), ShapeKind::ConvexHull);
    }

    #[test]
    fn test_rail_with_too_few_points_is_box() {
        let builder = ColliderBuilder::default();
        let few = builder
            .rail(&rail(vec![Vec3::ZERO, Vec3::X, Vec3::Y], None))
            .unwrap();
        assert_eq!(few.shape.kind(), ShapeKind::Cuboid);

        let none = builder.rail(&rail(Vec::new(), None)).unwrap();
        let ColliderShape::Cuboid { half_extents } = none.shape else {
            panic!("expected a box");
        };
        assert_eq!(half_extents, Vec3::new(0.15, 0.75, 0.2));
    }

    #[test]
    fn test_box_fallback_respects_min_half_extent() {
        // A flat strip: zero height.
        let source = rail(vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)], None);
        let descriptor = ColliderBuilder::default().rail(&source).unwrap();
        let ColliderShape::Cuboid { half_extents } = descriptor.shape else {
            panic!("expected a box");
        };
        assert_eq!(half_extents, Vec3::new(2.0, 0.1, 0.1));
        assert_eq!(descriptor.translation, Vec3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn test_hull_sampling_caps_points() {
        let vertices: Vec<Vec3> = (0..1050)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32;
                Vec3::new(t.sin(), t.cos(), t * 0.01)
            })
            .collect();
        let descriptor = ColliderBuilder::default()
            .rail(&rail(vertices, None))
            .unwrap();
        let ColliderShape::ConvexHull { points } = descriptor.shape else {
            panic!("expected a hull");
        };
        // Stride is ceil(1050 / 100) = 11, giving 96 samples.
        assert_eq!(points.len(), 96);
    }

    #[test]
    fn test_missing_transform_is_fatal() {
        let source = MeshSource {
            name: "orphan".into(),
            vertices: cube_vertices(),
            ..Default::default()
        };
        let err = ColliderBuilder::default().rail(&source).unwrap_err();
        assert!(matches!(err, Error::MissingTransform { ref object } if object == "orphan"));
    }

    #[test]
    fn test_rail_vertices_are_scaled_and_rotated() {
        let transform = ObjectTransform {
            translation: Vec3::new(0.0, 1.0, 0.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        let source = MeshSource::new("rail", transform)
            .with_geometry(vec![Vec3::X, Vec3::Y, Vec3::Z], Some(vec![0, 1, 2]));
        let descriptor = ColliderBuilder::default().rail(&source).unwrap();
        let ColliderShape::Trimesh { vertices, .. } = descriptor.shape else {
            panic!("expected a trimesh");
        };
        assert!(vertices[0].abs_diff_eq(Vec3::new(0.0, 0.0, -2.0), 1e-5));
        assert_eq!(descriptor.translation, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_terrain_prefers_heightfield() {
        let source = MeshSource::new(
            "terrain",
            ObjectTransform::from_translation(Vec3::new(3.0, 7.0, -2.0)),
        );
        let field = HeightfieldSource {
            rows: 2,
            cols: 3,
            heights: vec![0.0, 1.0, 0.0, 0.5, 2.0, 0.5],
            size: glam::Vec2::new(100.0, 50.0),
        };
        let descriptor = ColliderBuilder::default()
            .terrain(&source, Some(&field))
            .unwrap();
        let ColliderShape::Heightfield { heights, scale } = &descriptor.shape else {
            panic!("expected a heightfield");
        };
        assert_eq!(heights.len(), 2);
        assert_eq!(heights[1], vec![0.5, 2.0, 0.5]);
        // [z][x]: middle of the near row, first column of the far row.
        assert_eq!(heights[0][1], 1.0);
        assert_eq!(heights[1][0], 0.5);
        assert_eq!(*scale, Vec3::new(100.0, 1.0, 50.0));
        assert_eq!(descriptor.material, SurfaceMaterial::new(0.8, 0.2));
    }

    #[test]
    fn test_terrain_falls_back_to_flat_plane() {
        let source = MeshSource::new(
            "ground",
            ObjectTransform::from_translation(Vec3::new(3.0, 7.0, -2.0)),
        );
        let bad_field = HeightfieldSource {
            rows: 3,
            cols: 3,
            heights: vec![0.0; 4],
            size: glam::Vec2::splat(10.0),
        };
        let builder = ColliderBuilder::default();
        for field in [None, Some(&bad_field)] {
            let descriptor = builder.terrain(&source, field).unwrap();
            assert_eq!(descriptor.translation, Vec3::new(3.0, 0.0, -2.0));
            assert_eq!(
                descriptor.shape,
                ColliderShape::Cuboid {
                    half_extents: Vec3::new(500.0, 0.05, 500.0)
                }
            );
            assert_eq!(descriptor.groups, CollisionType::Ground.groups());
        }
    }

    #[test]
    fn test_chassis_carries_mass() {
        let params = VehicleParams::default();
        let descriptor = ColliderBuilder::default().chassis(&params);
        assert_eq!(descriptor.mass, Some(params.chassis_mass));
        assert_eq!(descriptor.collision_type, CollisionType::Vehicle);
    }

    #[test]
    fn test_checkpoint_is_sensor() {
        let source = MeshSource::new("checkpoint_1", ObjectTransform::default())
            .with_bounds(Aabb {
                min: Vec3::new(-5.0, 0.0, -0.5),
                max: Vec3::new(5.0, 4.0, 0.5),
            });
        let descriptor = ColliderBuilder::default().checkpoint(&source).unwrap();
        assert!(descriptor.sensor);
        assert_eq!(descriptor.translation, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_as_bounding_box() {
        let descriptor = ColliderDescriptor {
            shape: ColliderShape::ConvexHull {
                points: vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)],
            },
            translation: Vec3::new(1.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            material: SurfaceMaterial::new(0.1, 0.1),
            groups: CollisionType::Rail.groups(),
            collision_type: CollisionType::Rail,
            mass: None,
            sensor: false,
            source_name: "rail".into(),
        };
        let fallback = descriptor.as_bounding_box(0.1);
        assert_eq!(
            fallback.shape,
            ColliderShape::Cuboid {
                half_extents: Vec3::new(1.0, 0.1, 0.1)
            }
        );
        assert_eq!(fallback.translation, Vec3::new(2.0, 0.0, 0.0));
    }
}
