#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod config;
pub mod features;
pub mod form;
pub mod model;
pub mod session;
pub mod survey;
