//! # xborder-store — Persistence Collaborator Boundary
//!
//! The hierarchy validator and transfer scans never touch a database
//! directly. They read through [`RecipientStore`] and, on the guarded write
//! path, write through [`RecipientWriteStore`]. Production deployments
//! implement these traits over their database; [`InMemoryStore`] is the
//! reference implementation used by the CLI and the test suites.
//!
//! ## Tenant Scoping
//!
//! List operations are scoped by organization. Point lookups by id are not:
//! the caller receives the row and is responsible for comparing its
//! `organization_id` against the tenant it is acting for. This lets the
//! validator distinguish "parent not found" from "parent belongs to another
//! organization".

pub mod dataset;
pub mod error;
pub mod memory;
pub mod store;

pub use dataset::{Dataset, DatasetError};
pub use error::StoreError;
pub use memory::InMemoryStore;
pub use store::{RecipientStore, RecipientWriteStore};
