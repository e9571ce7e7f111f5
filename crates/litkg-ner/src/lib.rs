//! Annotation and entity linking for litkg.
//!
//! - [`AnnotationGateway`]: lifecycle and memory-pressure restarts around an
//!   [`AnnotationService`], shared by all annotation threads of a worker
//! - [`CoreNlpService`]: HTTP client (and optional launcher) for a
//!   CoreNLP-compatible open-IE server
//! - [`protocol`]: typed server output
//! - [`HttpEntityLinker`]: start-char entity maps from one or more linkers

pub mod error;
pub mod gateway;
pub mod linker;
pub mod memory;
pub mod protocol;
pub mod service;

pub use error::{AnnotateError, LinkerError, Result};
pub use gateway::{AnnotationGateway, Annotator, GatewayConfig, GatewayState};
pub use linker::{EntityLinker, HttpEntityLinker};
pub use memory::{MemoryProbe, SystemMemoryProbe};
pub use protocol::{AnnotatedDocument, AnnotationProperties, OpenIeTriple, Sentence, Token, TokenRange};
pub use service::{AnnotationService, CoreNlpConfig, CoreNlpService, LaunchConfig};
