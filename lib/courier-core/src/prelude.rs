//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use courier_core::prelude::*;
//! ```

pub use crate::{
    Body, Direction, Doer, DoerExt, Error, Method, Request, RequestBuilder, Response, Result,
    StatusCode, Url, from_json, to_json,
};
