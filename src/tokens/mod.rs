pub mod directory;
pub mod resolver;

pub use directory::{DirectoryStore, JsonFileStore, KnownContracts, MemoryStore, TokenDirectory};
pub use resolver::TokenResolver;
