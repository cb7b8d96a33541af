//! VttPack - compendium pack codec for virtual-tabletop content
//!
//! This crate converts between the on-disk compendium-pack formats consumed
//! by the host application and directories of human-editable JSON or YAML
//! source files, so game content can live in version control and still
//! round-trip back into the binary packs.

pub mod adventure;
pub mod document;
pub mod error;
pub mod folders;
pub mod hierarchy;
pub mod keys;
pub mod lock;
pub mod naming;
pub mod pack;
pub mod scan;
pub mod serializer;
pub mod store;
pub mod volatile;

// Re-exports for convenience
pub use error::{Error, Result};
pub use pack::{
    CompileOptions, ExtractOptions, RepairOptions, compile_pack, extract_pack, repair_pack,
};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::pack::{
        CompileOptions, ExtractOptions, RepairOptions, compile_pack, extract_pack, repair_pack,
    };
    pub use crate::serializer::{JsonOptions, YamlOptions};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
