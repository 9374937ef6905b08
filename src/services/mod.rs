//! Services separating file I/O from the tensor operations

pub mod io;

pub use io::TensorIoService;
