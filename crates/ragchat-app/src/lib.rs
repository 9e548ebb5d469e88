//! RAG chat client: WASM entry point.
//!
//! This crate is the composition root (DI wiring layer).
//! It assembles the platform adapters selected by `ChatConfig` and hands
//! them to the core registry and controller.

mod client;


pub use client::ChatClient;

use wasm_bindgen::prelude::*;

/// WASM entry point: called when the module is instantiated
#[wasm_bindgen(start)]
pub fn start() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("RAG chat client starting...");
}
