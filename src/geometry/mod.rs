pub mod merge;
pub mod polyline;

pub use merge::{merge_lines, LineOverlap};
pub use polyline::{
    clamp_to_length, components_length, extract_subline, locate, location_to_length,
    point_at_length, polyline_length, reverse, snap, PolylineLocation, SnapResult,
};
