//! Session persistence for PixelPipe.
//!
//! A session is one run of a workflow graph over one input. After every step
//! the engine writes a [`SessionRecord`] through a [`Checkpointer`]; the newest
//! record is enough to inspect, patch or continue the session.
//!
//! ```rust
//! use pixelpipe_checkpoint::{Checkpointer, InMemoryCheckpointer, SessionRecord};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let saver = InMemoryCheckpointer::new();
//! saver
//!     .save(SessionRecord::new("session_v1", json!({"artifact_ref": "shot.png"}), "vision_router"))
//!     .await?;
//!
//! let record = saver.load("session_v1").await?;
//! assert_eq!(record.next_step.as_deref(), Some("vision_router"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointer;
pub use record::{EngineStatus, RecordSource, SessionId, SessionRecord};
pub use traits::Checkpointer;
