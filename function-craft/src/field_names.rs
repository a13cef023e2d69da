//! Canonical short names of parameters and ports across the node catalog.

pub const A: &str = "A";
pub const B: &str = "B";
pub const C: &str = "C";
pub const D: &str = "D";

pub const RESULT: &str = "result";
pub const VALUE: &str = "value";
pub const SHAPE: &str = "shape";
pub const COLOR: &str = "color";
pub const ALPHA: &str = "alpha";
pub const VECTOR: &str = "vector";
pub const MATRIX: &str = "matrix";
pub const POS: &str = "pos";
pub const DISTANCE: &str = "distance";

pub const X: &str = "x";
pub const Y: &str = "y";
pub const Z: &str = "z";

pub const MIN: &str = "min";
pub const MAX: &str = "max";

pub const TRANSFORMATION: &str = "transformation";
pub const FUNCTION_ID: &str = "functionId";
pub const RESOURCE_ID: &str = "resourceId";
pub const MESH: &str = "mesh";
pub const BEAM_LATTICE: &str = "beamLattice";

pub const UVW: &str = "uvw";
pub const FILTER: &str = "filter";
pub const TILE_STYLE_U: &str = "tileStyleU";
pub const TILE_STYLE_V: &str = "tileStyleV";
pub const TILE_STYLE_W: &str = "tileStyleW";
pub const DIMENSIONS: &str = "dimensions";
pub const START: &str = "start";
pub const END: &str = "end";

pub const COL0: &str = "col0";
pub const COL1: &str = "col1";
pub const COL2: &str = "col2";
pub const COL3: &str = "col3";
pub const ROW0: &str = "row0";
pub const ROW1: &str = "row1";
pub const ROW2: &str = "row2";
pub const ROW3: &str = "row3";

/// `m00` .. `m33` in row-major order.
pub const MATRIX_COMPONENTS: [&str; 16] = [
	"m00", "m01", "m02", "m03", "m10", "m11", "m12", "m13", "m20", "m21", "m22", "m23", "m30", "m31", "m32", "m33",
];
