//! Client for a llama.cpp HTTP server (`llama-server`).

mod api;
mod client;

pub use client::LlamaServerEngine;
