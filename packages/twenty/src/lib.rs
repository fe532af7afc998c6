// ABOUTME: Twenty CRM REST client package
// ABOUTME: Implements the TwentyApi port over /rest endpoints with an explicit write allow-list

mod client;

pub use client::TwentyClient;
