//! # chartwire-core
//!
//! The chart-artifact transformation pipeline.
//!
//! A producer request flows strictly one way through six components:
//!
//! 1. **[`fetcher`]** -- read each referenced artifact from object storage,
//!    in parallel with bounded concurrency, timeouts and retry
//! 2. **[`encoder`]** -- derive the base64 text form alongside the bytes
//! 3. **[`splitter`]** -- produce an inline view and an export entry per chart
//! 4. **[`assembler`]** -- restore reference order, build the answer, the
//!    placeholder template and the export bundle, then run the [`guard`]
//! 5. **[`reconstructor`]** -- decode export entries back into bytes
//! 6. **[`resolver`]** -- swap placeholders in the template for embedded
//!    charts or unavailable markers
//!
//! [`pipeline::ChartPipeline`] drives steps 1-4 on the producer side and
//! [`consumer::DocumentBuilder`] drives steps 5-6 on the consumer side.

pub mod artifact;
pub mod assembler;
pub mod consumer;
pub mod encoder;
pub mod fetcher;
pub mod guard;
pub mod pipeline;
pub mod reconstructor;
pub mod resolver;
pub mod retry;
pub mod splitter;

pub use consumer::DocumentBuilder;
pub use pipeline::ChartPipeline;
