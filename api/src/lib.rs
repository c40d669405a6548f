pub mod adapters;
pub mod configuration;
pub mod domain;
pub mod opt_in;
pub mod routes;
pub mod signup_form;
pub mod startup;
pub mod utils;
