pub mod fs;
pub mod memory;

pub use fs::FsDocumentStore;
pub use memory::MemoryDocumentStore;
