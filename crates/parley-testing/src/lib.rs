//! # Parley Testing
//!
//! Test doubles for Parley bots.
//!
//! - [`TestAdapter`]: an in-memory channel that queues replies
//! - [`TestFlow`]: a scripted send/assert conversation over a
//!   [`TestAdapter`]
//!
//! ```rust,ignore
//! use parley_testing::{TestAdapter, TestFlow};
//!
//! #[tokio::test]
//! async fn test_greets() {
//!     TestFlow::new(TestAdapter::new(), GreeterBot)
//!         .test("hi", "Hello!")
//!         .run()
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod adapter;
pub mod flow;

pub use adapter::{TestAdapter, TestAdapterConfig};
pub use flow::{FlowError, TestFlow};
