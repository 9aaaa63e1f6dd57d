pub mod layout;
pub mod level_data;
pub mod patch;
pub mod rect;

pub use layout::{PatchLayout, ProblemDomain};
pub use level_data::LevelData;
pub use patch::PatchData;
pub use rect::Rect2i;
