//! # Lattice Engine
//!
//! Evaluates matrix expression trees by splitting every operation into one
//! task per row and running the batch on a fatigue-balanced [`Pool`].
//!
//! ## Pipeline
//!
//! ```text
//!   ComputationNode ──► associative rewrite ──► find leftmost resolvable node
//!                                                   │
//!            ┌──────────────────────────────────────┘
//!            ▼
//!   load operands into left/right SharedMatrix ──► one task per row ──► barrier
//!            │                                                            │
//!            └──── node.resolve(left.read_row_major()) ◄──────────────────┘
//! ```
//!
//! The loop ends when the root itself is a matrix leaf.
//!
//! ## Example
//!
//! ```rust,ignore
//! let engine = Engine::new(4)?;
//! let mut root = ComputationNode::add(vec![
//!     ComputationNode::matrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]]),
//!     ComputationNode::matrix(vec![vec![5.0, 6.0], vec![7.0, 8.0]]),
//! ]);
//! engine.run(&mut root)?;
//! assert_eq!(root.as_matrix(), Some(&vec![vec![6.0, 8.0], vec![10.0, 12.0]]));
//! ```
//!
//! [`Pool`]: lattice_scheduler::Pool

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod dag;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use dag::{ComputationNode, NodeKind, Operator};
pub use engine::{Engine, Evaluation};
pub use error::{EngineError, EngineResult};

pub use lattice_core::RawMatrix;
