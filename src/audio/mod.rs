pub mod decode;
pub mod pipeline;
