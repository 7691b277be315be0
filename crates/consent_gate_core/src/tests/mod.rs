#[macro_use]
mod fixtures;
