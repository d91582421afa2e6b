//! scriptres-lib: shell-command driven resource lifecycles.
//!
//! A managed resource is described entirely by user-supplied commands. This
//! crate turns those commands into a reliable lifecycle:
//! - `config`: resolved, immutable provider options
//! - `compose`: joins logical commands into the text handed to the interpreter
//! - `execute`: runs one composed command with bounded, line-logged output
//! - `read`: turns read command output into an observed resource state
//! - `lifecycle`: sequences create/read/update/delete/exists for a resource
//! - `state`: the observed resource state and its on-disk form

pub mod compose;
pub mod config;
pub mod execute;
pub mod lifecycle;
pub mod read;
pub mod state;
#[cfg(test)]
mod util;
