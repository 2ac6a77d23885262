//! Record container: TFRecord framing and `tf.train.Example` payloads.
//!
//! - [`RecordReader`] / [`RecordWriter`] - length-prefixed, CRC-checked framing
//! - [`RawTrajectory`] - one decoded Example: field name to byte strings

mod crc;
mod example;
mod reader;

pub use crc::{crc32c, masked_crc32c};
pub use example::RawTrajectory;
pub use reader::{RecordReader, RecordWriter};
