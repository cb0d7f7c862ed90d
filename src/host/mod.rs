/*!
 * Execution Hosts
 * Concrete collaborators the lifecycle kernel can run on
 */

pub mod threaded;

pub use threaded::{
    program, run_root, Fault, Program, Registers, Session, SimAddressSpace, SimContainer,
    ThreadHost, TrapFrame, DEFAULT_ADDRESS_SPACE_SIZE, PANIC_EXIT_CODE,
};
