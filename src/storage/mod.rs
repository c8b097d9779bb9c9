// Object storage: sandboxed key resolution, Range parsing, and scoped byte streams.

pub mod detect;
pub mod key;
pub mod range;
pub mod store;
pub mod stream;
pub mod traits;

pub use key::ResourceKey;
pub use range::ByteRange;
pub use store::FileSystemStore;
pub use stream::{ObjectStream, OpenedObject};
pub use traits::ObjectStore;
