pub mod form;
pub mod public;
pub mod review;
pub mod subscriber;
pub mod webhook;
