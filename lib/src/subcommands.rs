pub use client::*;
pub use evaluate::*;
pub use run::*;
pub use server::*;
pub use train::*;

pub mod client;
pub mod evaluate;
pub mod run;
pub mod server;
pub mod train;

pub mod packet;
