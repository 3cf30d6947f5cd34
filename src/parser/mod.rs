/// Multipart boundary parsing helpers.
pub mod boundary;
/// Part header parsing helpers.
pub mod headers;
/// Incremental multipart tokenizer.
pub mod tokenizer;
/// Content-Transfer-Encoding body decoders.
pub mod transfer;

pub use boundary::{boundary_from_headers, extract_multipart_boundary, validate_boundary};
pub use headers::{parse_content_disposition, parse_header_block, ContentDisposition, Headers};
pub use tokenizer::{Event, Step, Tokenizer};
pub use transfer::{TransferDecoder, TransferEncoding};
