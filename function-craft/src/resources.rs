use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::ResourceId;

/// Key under which the resource manager files an external resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey(pub ResourceId);

/// Extents of an image stack or voxel grid, cached into sampler nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceExtents {
	pub start_index: i32,
	pub end_index: i32,
	pub dimensions: Vec3,
}

/// Seam to the external resource manager (image stacks, voxel grids,
/// meshes). The core only ever asks for extents; a missing resource makes
/// the sampler degrade to zero extents rather than fail.
pub trait ResourceLookup {
	fn extents(&self, key: ResourceKey) -> Option<ResourceExtents>;
}

/// Lookup with no resources, for models that do not sample images.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResources;

impl ResourceLookup for NoResources {
	fn extents(&self, _key: ResourceKey) -> Option<ResourceExtents> {
		None
	}
}
