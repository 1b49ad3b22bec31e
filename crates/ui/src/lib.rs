pub mod render;
pub mod vm;

pub use render::render_dashboard;
pub use vm::{DashboardVm, map_dashboard};
