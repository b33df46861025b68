//! Named thread spawning for control loops.
//!
//! Each heater gets its own preemptible thread named after the heater so
//! it can be told apart in `top -H` and panic messages.

use std::io;
use std::thread::{Builder, JoinHandle};

/// Spawn `f` on a thread called `name` with a `stack_kb` KiB stack.
pub fn spawn_named(
    name: &str,
    stack_kb: usize,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    log::info!("Spawning '{}' (stack={}KB)", name, stack_kb);

    Builder::new()
        .name(format!("heater-{name}"))
        .stack_size(stack_kb * 1024)
        .spawn(f)
}
