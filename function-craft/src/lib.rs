//! Core model for volumetric implicit function graphs.
//!
//! A [`Model`] is a single typed dataflow graph between a distinguished
//! `Begin` node (function arguments, exposed as output ports) and an `End`
//! node (function outputs, exposed as input parameters). An [`Assembly`]
//! collects models by [`ResourceId`], one of them being the entry point.
//! Before evaluation the assembly is validated ([`validator`]) and flattened
//! ([`flatten`]) into a single self-contained model whose topological node
//! order is ready for kernel generation.

pub mod assembly;
pub mod expression;
pub mod extract;
pub mod field_names;
pub mod flatten;
pub mod model;
pub mod node;
pub mod parameter;
pub mod port;
pub mod resources;
pub mod rules;
pub mod serialization;
pub mod types;
pub mod validator;

pub use assembly::Assembly;
pub use model::Model;
pub use node::{Category, Node, NodeKind};
pub use parameter::{Parameter, Source};
pub use port::Port;
pub use types::{NodeId, ParameterId, ParameterType, PortId, ResourceId, Value};
