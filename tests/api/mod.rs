mod health_tests;
mod message_tests;
mod relay_tests;
