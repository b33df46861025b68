//! Hexagonal boundary: the port traits every hardware adapter implements.

pub mod ports;
