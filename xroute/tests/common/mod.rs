pub mod virtual_kernel;
