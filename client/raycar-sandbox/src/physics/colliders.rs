//! Turns collider descriptors into Avian colliders.

use avian3d::{
    parry::{na, shape::SharedShape},
    prelude::*,
};
use bevy::prelude::*;
use raycar::{ColliderDescriptor, ColliderPresets, ColliderShape, collision::CollisionGroups};

/// Components for one collider.
#[derive(Bundle)]
pub struct ColliderBundle {
    pub collider: Collider,
    pub friction: Friction,
    pub restitution: Restitution,
    pub layers: CollisionLayers,
    pub transform: Transform,
}

impl ColliderBundle {
    /// Physics pose matching `transform`, which may differ from the
    /// descriptor's when the shape fell back to a bounding box.
    pub fn pose(&self) -> (Position, Rotation) {
        (
            Position(self.transform.translation),
            Rotation(self.transform.rotation),
        )
    }
}

/// Convert broadphase groups to Avian layers.
pub fn collision_layers(groups: CollisionGroups) -> CollisionLayers {
    CollisionLayers::from_bits(u32::from(groups.membership), u32::from(groups.filter))
}

/// Build the Avian shape for a descriptor.
///
/// Hulls or meshes Avian rejects fall back to the descriptor's bounding box.
pub fn build_collider(descriptor: &ColliderDescriptor, presets: &ColliderPresets) -> ColliderBundle {
    let (collider, translation) = match shape_collider(&descriptor.shape) {
        Some(collider) => (collider, descriptor.translation),
        None => {
            tracing::warn!(
                object = %descriptor.source_name,
                kind = ?descriptor.shape.kind(),
                "Engine rejected shape; using bounding box"
            );
            let fallback = descriptor.as_bounding_box(presets.min_half_extent);
            let collider = shape_collider(&fallback.shape)
                .unwrap_or_else(|| Collider::cuboid(1.0, 1.0, 1.0));
            (collider, fallback.translation)
        }
    };

    ColliderBundle {
        collider,
        friction: Friction::new(descriptor.material.friction),
        restitution: Restitution::new(descriptor.material.restitution),
        layers: collision_layers(descriptor.groups),
        transform: Transform::from_translation(translation).with_rotation(descriptor.rotation),
    }
}

fn shape_collider(shape: &ColliderShape) -> Option<Collider> {
    match shape {
        ColliderShape::Cuboid { half_extents } => {
            let size = *half_extents * 2.0;
            Some(Collider::cuboid(size.x, size.y, size.z))
        }
        ColliderShape::ConvexHull { points } => Collider::convex_hull(points.clone()),
        ColliderShape::Trimesh {
            vertices,
            triangles,
        } => Collider::try_trimesh(vertices.clone(), triangles.clone()).ok(),
        ColliderShape::Heightfield { heights, scale } => heightfield_collider(heights, *scale),
    }
}

/// Heightfield with rows along Z and columns along X.
///
/// `Collider::heightfield` fills its matrix column-major from row-major input,
/// which scrambles non-square grids, so the matrix is built here.
fn heightfield_collider(heights: &[Vec<f32>], scale: Vec3) -> Option<Collider> {
    let rows = heights.len();
    let cols = heights.first().map_or(0, Vec::len);
    if rows < 2 || cols < 2 || heights.iter().any(|row| row.len() != cols) {
        return None;
    }
    let matrix = na::DMatrix::from_fn(rows, cols, |z, x| heights[z][x]);
    let shape = SharedShape::heightfield(matrix, na::Vector3::new(scale.x, scale.y, scale.z));
    Some(Collider::from(shape))
}
