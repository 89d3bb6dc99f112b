pub mod cli;
pub mod crc;
pub mod giver;
pub mod tvm;
pub mod utils;
