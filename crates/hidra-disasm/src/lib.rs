pub mod analyze;
pub mod model;

// Re-export commonly used types/functions for consumers
pub use analyze::{analyze_entries, build_report, Analysis, Block, Edge, EdgeKind, Report};
pub use model::{load_image, read_u8, Image};
