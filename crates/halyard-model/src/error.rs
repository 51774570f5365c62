// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Typed errors for model construction, setup, and solving.
//!
//! Setup errors fail the whole solve and surface to the caller. Invariant
//! violations detected inside the hot evaluation kernel are *not* errors:
//! they indicate a corrupt model and are treated as assertion failures.
//! Timeouts are not errors either; on timeout the current incumbents are
//! returned unchanged.

use thiserror::Error;

/// Errors surfaced by the model construction API and the setup pipeline.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A user-supplied name contains whitespace or illegal characters, or
    /// collides with an existing name of the same entity kind.
    #[error("invalid name `{name}`: {detail}")]
    InvalidName { name: String, detail: String },

    /// A proxy limit (`MAX_NUMBER_OF_*_PROXIES`) was exceeded.
    #[error("too many {kind} proxies: the limit is {limit}")]
    TooManyProxies { kind: &'static str, limit: usize },

    /// `solve` was called a second time on the same model.
    #[error("this model has already been solved")]
    AlreadySolved,

    /// The model is structurally unusable (no variables, no objective and no
    /// constraint, or an inconsistency discovered during setup).
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// An initial variable value is outside its admissible domain and
    /// initial-value correction is disabled.
    #[error("invalid initial value for `{name}`: {detail}")]
    InvalidInitialValue { name: String, detail: String },

    /// An option value is out of its admissible range.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// A user callback returned an error; the best incumbent found so far is
    /// preserved and returned alongside.
    #[error("user callback failed: {0}")]
    UserCallback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience alias used throughout the workspace.
pub type ModelResult<T> = Result<T, ModelError>;
