//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `init`   | `Init`           |
//! | `stats`  | `Stats`          |

pub mod init;
pub mod serve;
pub mod stats;

pub use init::cmd_init;
pub use serve::cmd_serve;
pub use stats::cmd_stats;
