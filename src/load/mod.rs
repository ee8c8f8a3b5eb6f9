//! Admission-controlled concurrent insertion pipeline.
//!
//! 1. **Record source** (`source`) - lazy rows from a delimited byte stream
//! 2. **Statement** (`statement`) - one parameterized insert built from the header
//! 3. **Admission** (`admission`) - counting semaphore bounding insertions in flight
//! 4. **Workers** (`worker`) - one task per admitted row
//! 5. **Collector** (`collector`) - serialized accounting of worker outcomes
//! 6. **Reporter** (`reporter`) - periodic status line
//! 7. **Pipeline** (`pipeline`) - wires the above and drains before reporting
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use stream_loader::load::{Pipeline, RecordSource};
//!
//! let pipeline = Pipeline::new(Arc::new(store), &config);
//! let source = RecordSource::spawn(std::io::stdin(), config.delimiter);
//! let report = pipeline.run(source).await?;
//!
//! println!("{}", report);
//! ```

pub mod admission;
pub mod collector;
pub mod pipeline;
pub mod reporter;
pub mod source;
pub mod statement;
pub mod stats;
pub mod task;
pub mod worker;

pub use pipeline::Pipeline;
pub use source::{Record, RecordSource};
pub use statement::{Statement, StatementBuilder};
pub use stats::{CounterSnapshot, LoadCounters, LoadReport};
