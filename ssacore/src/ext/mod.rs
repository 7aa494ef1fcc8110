pub mod ssalog;
