pub mod pg_handler;
