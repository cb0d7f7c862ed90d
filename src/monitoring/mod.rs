/*!
 * Monitoring Module
 * Tracing setup
 */

pub mod tracer;

pub use tracer::init_tracing;
