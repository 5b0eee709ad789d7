pub mod blueprint;
pub mod cache;
pub mod env;
pub mod error;
pub mod image;
pub mod include;
pub mod inherit;
pub mod job;
pub mod need;
pub mod pipeline;
mod populate;
pub mod render;
pub mod rule;
pub mod sequence;
pub mod validation;

pub use cache::{Cache, CacheKey, CachePolicy, CacheWhen};
pub use env::CiEnvironment;
pub use error::PipelineError;
pub use image::{Image, Service};
pub use include::Include;
pub use job::{Job, JobBuilder, Trigger, TriggerStrategy};
pub use need::{Need, NeedRef};
pub use pipeline::{JobId, Pipeline, SequenceId};
pub use render::PipelineDocument;
pub use rule::{Rule, When};
pub use sequence::{Node, Sequence, Suffix};
