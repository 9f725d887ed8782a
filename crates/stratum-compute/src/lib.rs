//! # Stratum Compute
//!
//! Message-passing layer for the Stratum kernels. This crate provides a
//! [`Communicator`](comm::Communicator) trait that isolates the numerical code
//! from the transport connecting the workers of a cluster.
//!
//! ## Available transports
//!
//! | Transport | Module | Status |
//! |-----------|--------|--------|
//! | In-process channels (one thread per worker) | [`distributed`] | Implemented |
//!
//! ## Operations
//!
//! Point-to-point `send`/`recv` plus the collectives `broadcast`, `reduce`,
//! `all_reduce`, `gather`, `scatterv` and `barrier`. Everything blocks; there is
//! no cancellation and no timeout.

pub mod comm;
pub mod distributed;

pub use comm::{CommError, Communicator, Rank, Tag, RESERVED_TAG_BASE};
pub use distributed::{launch, ChannelComm};
