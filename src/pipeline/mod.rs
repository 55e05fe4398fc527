//! Pipeline stages for question-paper-to-PDF conversion.
//!
//! Each submodule implements exactly one step and is tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! workspace ──▶ images ──▶ template ──▶ compile ──▶ protect
//! (tempdir)    (fetch)    (.tex/.json)  (engine x2)  (qpdf/pdftk)
//! ```
//!
//! 1. [`workspace`]: acquire an isolated directory tree for the request
//! 2. [`images`]: download or decode every image the source refers to;
//!    the only stage with network I/O
//! 3. [`template`]: write the data file and the `.tex` source
//! 4. [`compile`]: run the engine with a timeout and check the artifact
//! 5. [`protect`]: optional encryption, degrading to the plain artifact
//!
//! Stages run strictly in this order; only the downloads inside
//! [`images`] run concurrently.

pub mod compile;
pub mod images;
pub mod protect;
pub mod template;
pub mod workspace;
