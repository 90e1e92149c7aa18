mod compiler;
mod table;
mod types;

pub use compiler::{
    compile_scene_content, parse_scene_content_str, ContentCompileError, ContentErrorCode,
    SceneContent, SourceLocation,
};
pub use table::{SceneTable, SceneTableError};
pub use types::{DialogLine, DialogScript, SceneDescriptor, SceneKind, DEFAULT_ADVANCE_DELAY};
