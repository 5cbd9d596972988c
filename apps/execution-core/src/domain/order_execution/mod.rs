//! Order Execution Bounded Context
//!
//! Manages the order lifecycle from local creation to a terminal status.
//!
//! # Key Concepts
//!
//! - **Order Aggregate**: Persisted state of one logical submission
//! - **State Machine**: The only place status edges are decided
//! - **Partial Updates**: `OrderUpdate` distinguishes "leave as is" from "clear"

pub mod aggregate;
pub mod errors;
pub mod services;
pub mod value_objects;

pub use aggregate::Order;
pub use errors::OrderError;
pub use services::OrderStateMachine;
pub use value_objects::{
    FieldPatch, Fill, OrderRequest, OrderSide, OrderStatus, OrderType, OrderUpdate,
};
