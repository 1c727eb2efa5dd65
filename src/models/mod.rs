pub mod circuit_breaker;
pub mod mail;
pub mod message;
pub mod push;
pub mod queue;
pub mod recipient;
pub mod response;
pub mod retry;
pub mod status;
pub mod template;
