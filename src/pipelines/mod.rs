//! Background pipelines driven off the event bus.
//!
//! Each pipeline is a sequential consumer loop with manual acknowledgement;
//! the intake side acks after the store write, the fan-out side acks after
//! the provider accepts the mail. The reconciler is clock-driven, not
//! bus-driven, and closes the gap between APPROVED and SENT.

pub mod fanout;
pub mod intake;
pub mod reconciler;

pub use fanout::FanoutPipeline;
pub use intake::IntakePipeline;
pub use reconciler::Reconciler;
