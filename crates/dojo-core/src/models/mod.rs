pub mod connection;
pub mod envelope;
pub mod tool;
pub mod toolkit;

pub use connection::*;
pub use envelope::*;
pub use tool::*;
pub use toolkit::*;
