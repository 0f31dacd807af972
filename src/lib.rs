//! Reconstruction of structured statements and expressions from JVM bytecode, emitted as a
//! property graph through a [`hook::GraphHook`].

pub mod access;
pub mod block;
pub mod builder;
pub mod class_reader;
pub mod engine;
pub mod events;
pub mod hook;
pub mod memory_graph;
pub mod opcodes;
pub mod operand;
pub mod projection;
pub mod sequence;
pub mod types;
pub mod vertex;
