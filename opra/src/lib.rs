//! opra - read PDF documents aloud
//!
//! The pipeline runs page range → raw page text → normalized speech text →
//! word-bounded chunks → a speech engine driven one chunk at a time.
//!
//! - [`pdf`]: page text sources (lopdf files, in-memory pages)
//! - [`text`]: speech normalization and chunking
//! - [`extraction`]: page range selection and the extraction coordinator
//! - [`playback`]: the playback sequencer
//! - [`session`]: the async runtime tying them to a speech engine
//! - [`config`]: persisted reader settings

pub mod config;
pub mod extraction;
pub mod pdf;
pub mod playback;
pub mod session;
pub mod text;

pub use config::ReaderConfig;
pub use extraction::{Coordinator, ExtractionOptions, ExtractionResult, PageRange};
pub use playback::{PlaybackEvent, PlaybackSnapshot, PlaybackState, Sequencer};
pub use session::{Command, ReaderSession, SessionEvent, SessionHandle};
