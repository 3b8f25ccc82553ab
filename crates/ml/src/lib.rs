//! HDB resale price inference.
//!
//! A request flows through [`location`] (postal code resolution),
//! [`features`] (encoding and scaling against the [`schema`]) and
//! [`predictor`] (local candle model or [`remote`] inference server).
//! [`pipeline::PricePipeline`] ties the stages together over an
//! [`artifacts::ArtifactCache`].

pub mod artifacts;
pub mod error;
pub mod features;
pub mod input;
pub mod location;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod remote;
pub mod report;
pub mod scaler;
pub mod schema;

pub use artifacts::ArtifactCache;
pub use error::{ConfigurationError, InvocationError, PipelineError, ValidationError};
pub use input::{AreaUnit, FloorArea, LocationSpec, RawPropertyInput};
pub use pipeline::PricePipeline;
pub use predictor::{PredictionContext, PredictionResult, Predictor};
