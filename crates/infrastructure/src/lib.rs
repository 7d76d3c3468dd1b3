//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_board_repository;
mod in_memory_board_repository;

pub use http_board_repository::HttpBoardRepository;
pub use in_memory_board_repository::InMemoryBoardRepository;
