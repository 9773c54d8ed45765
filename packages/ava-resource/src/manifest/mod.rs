pub mod task;
pub mod template;

pub use task::{TaskConfig, TaskManifest, WindowTarget};
pub use template::{ClickMode, ClickPadding, MatchMethod, SearchRegion, TemplateConfig, TemplateDef};
