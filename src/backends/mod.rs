//! Line sampler backends.
//!
//! Implementations of [`LineSampler`](crate::sampler::LineSampler):
//! - [`sysfs`] reads the Linux `/sys/class/gpio` tree (exporting lines on demand).
//! - [`virtual_input`] keeps levels in memory; used by the simulator and tests.
//!
//! The engine only ever sees the trait, so swapping a backend never touches decoding.

use crate::config::DeckConfig;
use crate::sampler::LineSampler;

pub mod sysfs;
pub mod virtual_input;

/// Build the sampler selected by configuration.
///
/// With `simulate` set, returns a [`virtual_input::VirtualSampler`] and its control
/// handle; otherwise a [`sysfs::SysfsSampler`] and `None`.
pub fn open_sampler(
    config: &DeckConfig,
    simulate: bool,
) -> (Box<dyn LineSampler + Send>, Option<virtual_input::VirtualLines>) {
    if simulate {
        let sampler = virtual_input::VirtualSampler::new();
        let handle = sampler.handle();
        (Box::new(sampler), Some(handle))
    } else {
        (
            Box::new(sysfs::SysfsSampler::new(
                config.sysfs_root.clone(),
                config.sysfs_base,
            )),
            None,
        )
    }
}
