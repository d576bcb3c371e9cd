//! Binary decoding of the v6 scene format.
//!
//! Layers, leaf first: primitive reads ([`primitives`]), tagged field framing
//! ([`tagged`]), per-type block decoders ([`block`]) and the lazy stream
//! driver ([`stream`]).

pub mod block;
pub mod primitives;
pub mod stream;
pub mod tagged;

#[cfg(test)]
pub(crate) mod testing;

pub use block::decode_block;
pub use primitives::{Reader, Utf8Policy};
pub use stream::{
    BlockStream, DecodeOptions, SkippedBlock, decode_blocks, decode_blocks_with_options,
    read_blocks, read_blocks_with_options,
};
pub use tagged::{Field, FieldValue, TagType};
