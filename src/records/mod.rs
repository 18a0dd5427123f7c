//! Log records, compressed record sets and the record batch envelope.

pub mod batch;
pub mod compressed;
pub mod compression;
pub mod record;

pub use batch::RecordBatch;
pub use compressed::CompressedRecords;
pub use compression::Compression;
pub use record::{Record, RecordHeader};
