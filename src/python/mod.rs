mod bindings;

pub use bindings::{PyStreamingDecoder, PyTokenizer};
