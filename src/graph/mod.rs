pub mod edge;
pub mod network;

pub use edge::{Edge, EdgeSegment, RoadEdge};
pub use network::{RoadGraph, RoadNetwork};
