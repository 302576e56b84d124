pub mod controller;
pub mod google;
pub mod index;
pub mod model;
pub mod service;
