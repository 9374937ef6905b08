//! DeepLab augmentation CLI tool
//!
//! Writes augmented image/label samples produced by the deeplab-ops
//! preprocessing pipeline.

#[cfg(feature = "cli")]
use deeplab_ops::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
