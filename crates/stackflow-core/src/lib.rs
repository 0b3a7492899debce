//! StackFlow Core
//!
//! KDLスタックファイルのパースと検証。
//!
//! ```kdl
//! stack "web"
//!
//! resource "my-key" type="ssh_key" {
//!     name "deployment-key"
//! }
//!
//! resource "web-server" type="vps" {
//!     image "ubuntu-24.04"
//!     ssh_key_id ref="my-key.id"
//! }
//!
//! export "vps_public_ip" ref="web-server.public_ip"
//! ```

pub mod error;
pub mod loader;
pub mod model;
pub mod parser;

pub use error::{Result, StackError};
pub use loader::{LoadedStack, build_stack, load_stack};
pub use model::{Export, Stack};
pub use parser::{parse_stack_file, parse_stack_string};
