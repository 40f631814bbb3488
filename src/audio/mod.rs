//! Audio side of the pipeline: decode, playback transport, and the
//! spectrum sampler feeding the visual mapper.

pub mod analyser;
pub mod decode;
pub mod playback;
pub mod sampler;
