pub mod error;
pub mod range;
pub mod record;
pub mod formats;
pub mod convert;
pub mod registry;
pub mod memory;
pub mod report;
pub mod io_stream;

pub use error::{RecordError, Result, SequenceError};
pub use range::{merge_blocks, Block};
pub use record::{Checksum, Format, Record, SplitOptions};
pub use formats::{Binary, Intel, Mos, Motorola};
pub use convert::{blocks_to_records, convert_records, merge_records, records_to_blocks};
pub use registry::{find_format, FormatId, Registry};
pub use memory::SparseMemory;
pub use io_stream::{InputFile, RecordSeq};
