// ABOUTME: Linear GraphQL client package
// ABOUTME: Implements the LinearApi port over api.linear.app/graphql

mod client;

pub use client::LinearClient;
