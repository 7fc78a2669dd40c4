//! # a3s-device
//!
//! Device action dispatch for embedded web UIs: dialer, SMS, WhatsApp and
//! contact picking, behind one permission coordinator.
//!
//! ## Overview
//!
//! A host UI sends named requests (`Device.OpenDialer`, `Device.PickContact`,
//! ...) and gets an immediate acknowledgement. The work runs against an
//! [`OsGateway`], the seam to the native platform, and results that only
//! exist later (a picked contact) come back as events.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_device::{BridgeEvent, DeviceConfig, MemoryGateway, Session, CONTACT_SELECTED};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let session = Session::new(Arc::new(MemoryGateway::new()), DeviceConfig::default());
//!
//! session.events().subscribe(
//!     CONTACT_SELECTED,
//!     Arc::new(|event: &BridgeEvent| println!("Picked: {}", event.payload)),
//! );
//!
//! let ack = session.call(
//!     "Device.OpenDialer",
//!     serde_json::json!({"phone": "+1 (555) 123-4567", "autoCall": true}),
//! );
//! assert_eq!(ack, serde_json::json!({"success": true}));
//!
//! session.settle().await;
//! # }
//! ```
//!
//! ## Gateways
//!
//! - **memory**: scriptable in-process gateway for tests and host-less use
//! - platform gateways implement [`OsGateway`] in the host application
//!
//! ## Architecture
//!
//! - **Session**: one per UI session; owns everything below and tears it down
//! - **ActionDispatcher**: validates requests and spawns handler work
//! - **PermissionCoordinator**: per-kind authorization and suspended continuations
//! - **ContactResolver**: tolerant parsing of picker rows
//! - **EventEmitter**: name-keyed notification channel back to the host

pub mod config;
pub mod dispatcher;
pub mod emitter;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod permission;
pub mod phone;
pub mod resolver;
pub mod session;
pub mod types;

// Re-export core types
pub use config::{BlockingPrompt, ChatAppConfig, DeviceConfig, DeviceFieldConfig, NoticeConfig};
pub use dispatcher::ActionDispatcher;
pub use emitter::{EventEmitter, EventHandler};
pub use error::{DeviceError, ErrorKind, Result};
pub use gateway::{BlockingChoice, ContactRow, OsGateway, PickerResult};
pub use permission::{Authorization, BatchOutcome, BatchPhase, PermissionCoordinator};
pub use resolver::{ContactResolver, FieldMatcher, Resolution};
pub use session::Session;
pub use types::{
    ActionKind, ActionRequest, BridgeEvent, BridgeOutcome, ChatMode, ContactResult, ContactSource,
    PermissionKind, PermissionState, CONTACT_SELECTED,
};

// Re-export the in-memory gateway for convenience
pub use gateway::memory::{GatewayCall, MemoryGateway};
