pub mod container_writer;

pub use container_writer::ContainerWriter;
