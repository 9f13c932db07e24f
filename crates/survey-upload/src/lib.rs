//! Resumable survey photo upload pipeline.
//!
//! [`UploadPipeline`] drives one upload run: authenticate, register the
//! survey and its photos ([`BatchRegistrar`]), transfer photo bytes
//! ([`TransferEngine`]) and mark the flight complete ([`Finalizer`]).
//! Everything needed to resume an interrupted run is kept by the
//! [`CheckpointStore`] next to the photos.

pub mod checkpoint;
pub mod finalizer;
pub mod pipeline;
pub mod registrar;
pub mod transfer;

pub use checkpoint::CheckpointStore;
pub use finalizer::Finalizer;
pub use pipeline::{Credentials, UploadPipeline, UploadReport};
pub use registrar::{BatchRegistrar, Registration};
pub use transfer::{LoggingObserver, ProgressObserver, TransferEngine};
