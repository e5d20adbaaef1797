mod model_types;
pub mod params;
pub mod retry;

pub use model_types::StyleModel;
pub use params::{AspectRatio, FluxParams, ParamError, StyleParams};
pub use retry::{RetryPolicy, TransportFailure};
