mod config_tests;
mod coordinator_tests;
mod executor_tests;
mod support;
