pub mod instruction;
/// Render requests, contexts and destination pixel buffers.
pub mod request;
pub mod scheduler;
