pub mod cfg;
pub mod error;
pub mod generator;
pub mod lexer;
pub mod parser;
pub mod tac;
