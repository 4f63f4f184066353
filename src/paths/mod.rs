pub mod diff;
pub mod merge;
pub mod path;
pub mod projection;
pub mod state;

pub use diff::state_diff;
pub use merge::{merge_paths, MergedPath};
pub use path::{Path, PathEdge};
pub use projection::{
    ground_from_road, road_from_ground, segment_projection, SegmentProjection,
};
pub use state::PathState;
